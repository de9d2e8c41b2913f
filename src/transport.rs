//! Outbound fan-out to peers and the wire shape of a protocol message.

use crate::inbox::Phase;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The `/message` request body (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub phase: u8,
    pub value: Value,
    pub k: u64,
    pub from: usize,
}

impl WireMessage {
    pub fn phase(&self) -> Option<Phase> {
        match self.phase {
            1 => Some(Phase::One),
            2 => Some(Phase::Two),
            _ => None,
        }
    }
}

/// Best-effort fan-out to every peer except self. Owns the `reqwest`
/// client and the `/message` URL of each peer in `[0, N)`.
pub struct Transport {
    client: reqwest::Client,
    self_id: usize,
    peer_urls: Vec<String>,
}

impl Transport {
    pub fn new(self_id: usize, n: usize, base_port: u16) -> Self {
        let peer_urls = (0..n)
            .map(|i| format!("http://127.0.0.1:{}/message", base_port as usize + i))
            .collect();
        Transport {
            client: reqwest::Client::new(),
            self_id,
            peer_urls,
        }
    }

    /// Dispatches `(phase, value, round)` to every peer concurrently.
    /// Per-peer failures (connection refused, timeout, a 500 from a
    /// killed/faulty peer) are silently swallowed. Returns only once every
    /// dispatch has either succeeded or failed.
    pub async fn broadcast(&self, phase: Phase, value: Value, round: u64) {
        let phase_num = match phase {
            Phase::One => 1,
            Phase::Two => 2,
        };
        let body = WireMessage {
            phase: phase_num,
            value,
            k: round,
            from: self.self_id,
        };

        let dispatches = self
            .peer_urls
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.self_id)
            .map(|(_, url)| {
                let client = self.client.clone();
                let url = url.clone();
                let body = body.clone();
                async move {
                    if let Err(err) = client.post(&url).json(&body).send().await {
                        warn!(%url, %err, "peer unreachable, dropping message");
                    }
                }
            });

        futures::future::join_all(dispatches).await;
    }
}
