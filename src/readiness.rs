//! The cluster-wide readiness barrier the embedder plugs in (spec.md §6).
//!
//! This crate only needs the callback shape: `ready()` to poll whether the
//! whole cluster is up, and `set_ready(id)` to announce this node's own
//! liveness. Cross-process coordination is out of scope (spec.md §1), so
//! the production default is a no-op; an in-process implementation is
//! provided for single-process multi-node tests.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait ReadinessBarrier: Send + Sync {
    fn ready(&self) -> bool;
    fn set_ready(&self, id: usize);
}

/// Always reports ready and ignores `set_ready`. The correct default when
/// there is no cluster-wide coordinator to talk to.
pub struct NoopBarrier;

impl ReadinessBarrier for NoopBarrier {
    fn ready(&self) -> bool {
        true
    }

    fn set_ready(&self, _id: usize) {}
}

/// An in-process barrier backed by a bitset, for test harnesses that spin
/// up several nodes in one process and want to observe when all of them
/// have announced readiness.
pub struct BitsetBarrier {
    n: usize,
    bits: AtomicU64,
}

impl BitsetBarrier {
    pub fn new(n: usize) -> Self {
        assert!(n <= 64, "BitsetBarrier supports at most 64 nodes");
        BitsetBarrier {
            n,
            bits: AtomicU64::new(0),
        }
    }
}

impl ReadinessBarrier for BitsetBarrier {
    fn ready(&self) -> bool {
        let mask = if self.n == 64 {
            u64::MAX
        } else {
            (1u64 << self.n) - 1
        };
        self.bits.load(Ordering::SeqCst) & mask == mask
    }

    fn set_ready(&self, id: usize) {
        self.bits.fetch_or(1 << id, Ordering::SeqCst);
    }
}
