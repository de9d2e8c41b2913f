//! The per-node state machine: construction, the Control Surface's
//! framework-independent operations, and the round loop that drives a
//! participant from IDLE through to DECIDED or DEAD.

use crate::error::NodeError;
use crate::inbox::{Inbox, Phase};
use crate::readiness::ReadinessBarrier;
use crate::tally;
use crate::transport::Transport;
use crate::value::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PHASE_WAIT: Duration = Duration::from_millis(200);
const ROUND_PAUSE: Duration = Duration::from_millis(10);

/// The fields reported by `/getState` for a non-faulty node (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct ConsensusState {
    pub killed: bool,
    pub started: bool,
    pub x: Value,
    pub decided: bool,
    pub k: u64,
}

/// A live (non-faulty) participant: everything spec.md §4 describes.
pub struct Participant {
    pub id: usize,
    pub n: usize,
    pub f: usize,
    state: RwLock<ConsensusState>,
    inbox: Inbox,
    transport: Transport,
    readiness: Arc<dyn ReadinessBarrier>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// A faulty node holds no meaningful protocol state (spec.md §3): it
/// neither sends nor processes messages, and only `killed` is a real,
/// observable boolean.
pub struct Faulty {
    pub id: usize,
    killed: std::sync::atomic::AtomicBool,
}

pub enum Node {
    Participant(Arc<Participant>),
    Faulty(Faulty),
}

impl Node {
    pub fn new_participant(
        id: usize,
        n: usize,
        f: usize,
        initial_value: u8,
        base_port: u16,
        readiness: Arc<dyn ReadinessBarrier>,
    ) -> Self {
        let participant = Participant {
            id,
            n,
            f,
            state: RwLock::new(ConsensusState {
                killed: false,
                started: false,
                x: Value::from_bit(initial_value),
                decided: false,
                k: 0,
            }),
            inbox: Inbox::new(),
            transport: Transport::new(id, n, base_port),
            readiness,
            task: std::sync::Mutex::new(None),
        };
        Node::Participant(Arc::new(participant))
    }

    pub fn new_faulty(id: usize) -> Self {
        Node::Faulty(Faulty {
            id,
            killed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> usize {
        match self {
            Node::Participant(p) => p.id,
            Node::Faulty(f) => f.id,
        }
    }

    pub fn is_faulty(&self) -> bool {
        matches!(self, Node::Faulty(_))
    }

    /// `GET /status`: live nodes report `"live"`, faulty nodes refuse.
    pub fn status(&self) -> Result<&'static str, NodeError> {
        match self {
            Node::Faulty(_) => Err(NodeError::Faulty),
            Node::Participant(_) => Ok("live"),
        }
    }

    /// `GET /getState`.
    pub fn get_state(&self) -> StateSnapshot {
        match self {
            Node::Faulty(f) => StateSnapshot {
                killed: f.killed.load(std::sync::atomic::Ordering::SeqCst),
                x: None,
                decided: None,
                k: None,
            },
            Node::Participant(p) => {
                let state = p.state.read().expect("state lock poisoned");
                StateSnapshot {
                    killed: state.killed,
                    x: Some(state.x),
                    decided: Some(state.decided),
                    k: Some(state.k),
                }
            }
        }
    }

    /// `GET /start`: non-blocking, returns as soon as the round loop has
    /// been spawned (or the single-node shortcut has decided).
    pub fn start(&self) -> Result<(), NodeError> {
        let participant = match self {
            Node::Faulty(_) => return Err(NodeError::Faulty),
            Node::Participant(p) => p.clone(),
        };

        let mut state = participant.state.write().expect("state lock poisoned");
        if state.killed {
            return Err(NodeError::Killed);
        }
        if state.started {
            // Re-entrant start: a no-op (spec.md §4.4).
            return Ok(());
        }
        state.started = true;

        if participant.n == 1 {
            // Single-node shortcut (spec.md §4.4): decide immediately, no rounds.
            state.decided = true;
            info!(node = participant.id, x = %state.x, "single-node shortcut decided");
            participant.readiness.set_ready(participant.id);
            return Ok(());
        }
        drop(state);

        let handle = tokio::spawn(run_rounds(participant.clone()));
        *participant.task.lock().expect("task lock poisoned") = Some(handle);
        participant.readiness.set_ready(participant.id);
        Ok(())
    }

    /// `GET /stop`: always succeeds, and is permanent (spec.md §4.4, §5).
    pub fn stop(&self) {
        match self {
            Node::Faulty(f) => {
                f.killed.store(true, std::sync::atomic::Ordering::SeqCst);
            }
            Node::Participant(p) => {
                p.state.write().expect("state lock poisoned").killed = true;
            }
        }
    }

    /// `POST /message`.
    pub fn receive_message(&self, phase: Phase, round: u64, value: Value, from: usize) -> Result<(), NodeError> {
        match self {
            Node::Faulty(_) => Err(NodeError::Faulty),
            Node::Participant(p) => {
                let killed = p.state.read().expect("state lock poisoned").killed;
                if killed {
                    return Err(NodeError::Killed);
                }
                p.inbox.deliver(phase, round, value, from);
                Ok(())
            }
        }
    }
}

/// The JSON-shaped view of a node's state, independent of axum.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StateSnapshot {
    pub killed: bool,
    pub x: Option<Value>,
    pub decided: Option<bool>,
    pub k: Option<u64>,
}

fn phase1_threshold(p: &Participant) -> usize {
    p.n.saturating_sub(p.f).saturating_sub(1)
}

/// The round loop (spec.md §4.4): phase 1 → phase 2 → next round, until
/// DECIDED or DEAD. Runs as its own task so it can progress concurrently
/// with inbound `/message` handlers.
async fn run_rounds(p: Arc<Participant>) {
    loop {
        let (killed, x, k) = {
            let state = p.state.read().expect("state lock poisoned");
            (state.killed, state.x, state.k)
        };
        if killed {
            return;
        }

        let threshold = phase1_threshold(&p);

        // Phase 1.
        p.transport.broadcast(Phase::One, x, k).await;
        let phase1_msgs = p
            .inbox
            .wait_for(Phase::One, k, threshold, PHASE_WAIT)
            .await;
        if is_killed(&p) {
            return;
        }
        let x = tally::phase1_tally(x, &phase1_msgs, p.n);
        {
            p.state.write().expect("state lock poisoned").x = x;
        }
        debug!(node = p.id, round = k, phase1_result = %x, "phase 1 tally");

        if is_killed(&p) {
            return;
        }

        // Phase 2.
        p.transport.broadcast(Phase::Two, x, k).await;
        let phase2_msgs = p
            .inbox
            .wait_for(Phase::Two, k, threshold, PHASE_WAIT)
            .await;
        if is_killed(&p) {
            return;
        }
        let outcome = {
            let mut rng = rand::thread_rng();
            tally::phase2_tally(x, &phase2_msgs, p.n, p.f, &mut rng)
        };
        {
            let mut state = p.state.write().expect("state lock poisoned");
            state.x = outcome.next_x;
            if outcome.decided {
                state.decided = true;
            }
        }

        if outcome.decided {
            info!(node = p.id, round = k, decided = %outcome.next_x, "decided");
            return;
        }
        if is_killed(&p) {
            return;
        }

        {
            let mut state = p.state.write().expect("state lock poisoned");
            state.k = k + 1;
        }
        p.inbox.prune_before(k);
        tokio::time::sleep(ROUND_PAUSE).await;
    }
}

fn is_killed(p: &Participant) -> bool {
    let killed = p.state.read().expect("state lock poisoned").killed;
    if killed {
        warn!(node = p.id, "round loop observed killed, exiting");
    }
    killed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::NoopBarrier;

    fn node(id: usize, n: usize, f: usize, initial: u8) -> Arc<Node> {
        Arc::new(Node::new_participant(
            id,
            n,
            f,
            initial,
            20000,
            Arc::new(NoopBarrier),
        ))
    }

    #[tokio::test]
    async fn single_node_decides_immediately_without_rounds() {
        let n = node(0, 1, 0, 1);
        n.start().unwrap();
        let snap = n.get_state();
        assert_eq!(snap.killed, false);
        assert_eq!(snap.decided, Some(true));
        assert_eq!(snap.x, Some(Value::One));
        assert_eq!(snap.k, Some(0));
    }

    #[test]
    fn faulty_node_reports_faulty_status_and_null_state() {
        let n = Node::new_faulty(3);
        assert!(matches!(n.status(), Err(NodeError::Faulty)));
        let snap = n.get_state();
        assert_eq!(snap.killed, false);
        assert_eq!(snap.x, None);
        assert_eq!(snap.decided, None);
        assert_eq!(snap.k, None);
    }

    #[tokio::test]
    async fn stop_is_permanent_and_rejects_further_messages() {
        let n = node(0, 3, 0, 0);
        n.stop();
        let snap = n.get_state();
        assert!(snap.killed);
        assert!(matches!(n.start(), Err(NodeError::Killed)));
        assert!(matches!(
            n.receive_message(Phase::One, 0, Value::Zero, 1),
            Err(NodeError::Killed)
        ));
    }

    #[tokio::test]
    async fn re_entrant_start_is_a_no_op() {
        let n = node(0, 3, 0, 0);
        n.start().unwrap();
        // Second start while RUNNING must not error and must not reset k.
        n.start().unwrap();
        let snap = n.get_state();
        assert_eq!(snap.k, Some(0));
        n.stop();
    }
}
