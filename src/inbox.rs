//! Round- and phase-indexed buffer of messages received from peers.

use crate::value::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// The protocol phase a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    One,
    Two,
}

type Bucket = Vec<(Value, usize)>;

/// A mailbox of `(phase, round) -> multiset of (value, sender)` entries.
///
/// Delivery never rejects well-formed input and is never idempotent:
/// duplicates count (spec.md §4.1). Safe to `deliver` and `snapshot`
/// concurrently — both go through the same `Mutex`, held only for the
/// duration of a `HashMap` lookup, never across an `.await`.
pub struct Inbox {
    buckets: Mutex<HashMap<(Phase, u64), Bucket>>,
    notify: Notify,
}

impl Inbox {
    pub fn new() -> Self {
        Inbox {
            buckets: Mutex::new(HashMap::new()),
            notify: Notify::new(),
        }
    }

    /// Appends `(value, from)` to the `(phase, round)` bucket. Messages for
    /// rounds ahead of the current one are accepted (they may arrive
    /// early); it is the caller's responsibility to decide whether a
    /// message for a past round should be dropped before calling this.
    pub fn deliver(&self, phase: Phase, round: u64, value: Value, from: usize) {
        let mut buckets = self.buckets.lock().expect("inbox mutex poisoned");
        buckets.entry((phase, round)).or_default().push((value, from));
        drop(buckets);
        // Wake every waiter; each re-checks its own threshold against the
        // bucket it cares about, so an unrelated bucket's delivery is a
        // harmless spurious wakeup rather than a correctness issue.
        self.notify.notify_waiters();
    }

    /// Returns a snapshot (clone) of the current contents of a bucket.
    pub fn snapshot(&self, phase: Phase, round: u64) -> Bucket {
        self.buckets
            .lock()
            .expect("inbox mutex poisoned")
            .get(&(phase, round))
            .cloned()
            .unwrap_or_default()
    }

    /// Waits until the `(phase, round)` bucket holds at least `threshold`
    /// entries, or `max_wait` has elapsed, whichever comes first. Returns
    /// whatever the bucket holds at that point.
    ///
    /// Implemented as a condition-variable wait (per spec.md §9's stated
    /// preference) with a short timeout slice as a backstop against a
    /// `deliver` landing in the narrow window between our threshold check
    /// and subscribing to the next notification.
    pub async fn wait_for(
        &self,
        phase: Phase,
        round: u64,
        threshold: usize,
        max_wait: Duration,
    ) -> Bucket {
        let deadline = Instant::now() + max_wait;
        loop {
            let snap = self.snapshot(phase, round);
            if snap.len() >= threshold {
                return snap;
            }
            let now = Instant::now();
            if now >= deadline {
                return snap;
            }
            let slice = (deadline - now).min(Duration::from_millis(20));
            let notified = self.notify.notified();
            let _ = tokio::time::timeout(slice, notified).await;
        }
    }

    /// Drops buckets for rounds strictly less than `keep_from`. Safe
    /// because only out-of-order messages for the immediately prior round
    /// could still arrive once a round has fully completed (spec.md §9).
    pub fn prune_before(&self, keep_from: u64) {
        let mut buckets = self.buckets.lock().expect("inbox mutex poisoned");
        buckets.retain(|&(_, round), _| round >= keep_from);
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_accumulates_duplicates() {
        let inbox = Inbox::new();
        inbox.deliver(Phase::One, 0, Value::Zero, 1);
        inbox.deliver(Phase::One, 0, Value::Zero, 1);
        assert_eq!(inbox.snapshot(Phase::One, 0).len(), 2);
    }

    #[test]
    fn buckets_are_independent() {
        let inbox = Inbox::new();
        inbox.deliver(Phase::One, 0, Value::Zero, 1);
        inbox.deliver(Phase::Two, 0, Value::One, 1);
        assert_eq!(inbox.snapshot(Phase::One, 0).len(), 1);
        assert_eq!(inbox.snapshot(Phase::Two, 0).len(), 1);
        assert_eq!(inbox.snapshot(Phase::One, 1).len(), 0);
    }

    #[test]
    fn prune_keeps_current_and_future_rounds() {
        let inbox = Inbox::new();
        inbox.deliver(Phase::One, 0, Value::Zero, 1);
        inbox.deliver(Phase::One, 1, Value::Zero, 1);
        inbox.deliver(Phase::One, 2, Value::Zero, 1);
        inbox.prune_before(1);
        assert_eq!(inbox.snapshot(Phase::One, 0).len(), 0);
        assert_eq!(inbox.snapshot(Phase::One, 1).len(), 1);
        assert_eq!(inbox.snapshot(Phase::One, 2).len(), 1);
    }

    #[tokio::test]
    async fn wait_for_returns_as_soon_as_threshold_met() {
        let inbox = std::sync::Arc::new(Inbox::new());
        let waiter = {
            let inbox = inbox.clone();
            tokio::spawn(async move {
                inbox
                    .wait_for(Phase::One, 0, 2, Duration::from_millis(200))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        inbox.deliver(Phase::One, 0, Value::Zero, 1);
        inbox.deliver(Phase::One, 0, Value::One, 2);

        let start = Instant::now();
        let result = waiter.await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(start.elapsed() < Duration::from_millis(190));
    }

    #[tokio::test]
    async fn wait_for_times_out_when_threshold_never_met() {
        let inbox = Inbox::new();
        let start = Instant::now();
        let result = inbox
            .wait_for(Phase::One, 0, 5, Duration::from_millis(30))
            .await;
        assert!(result.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
