use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{error::WeatherError, model::WeatherSnapshot};

/// Outcome published to every caller that joined the same fetch.
pub type FetchOutcome = Result<WeatherSnapshot, WeatherError>;

/// What `begin` hands back: either you own the fetch, or you wait for the
/// caller that does.
pub enum Ticket {
    /// This caller must perform the fetch and call [`InflightRegistry::complete`]
    /// on every exit path.
    Leader,
    /// Another fetch for the same key is outstanding; await its outcome.
    Follower(broadcast::Receiver<FetchOutcome>),
}

/// Per-key deduplication of concurrent fetches.
///
/// Guarantees at most one outstanding external fetch per key: the first
/// caller becomes the leader, everyone else receives the leader's outcome
/// over a broadcast channel. Owned and injectable so tests get isolated
/// state instead of a process-wide map.
#[derive(Debug, Default)]
pub struct InflightRegistry {
    pending: Mutex<HashMap<String, broadcast::Sender<FetchOutcome>>>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a pending fetch for `key`, if any.
    pub fn subscribe(&self, key: &str) -> Option<broadcast::Receiver<FetchOutcome>> {
        self.pending.lock().get(key).map(|tx| tx.subscribe())
    }

    /// Register a fetch for `key`, or join the one already pending.
    pub fn begin(&self, key: &str) -> Ticket {
        let mut pending = self.pending.lock();
        if let Some(tx) = pending.get(key) {
            return Ticket::Follower(tx.subscribe());
        }

        let (tx, _rx) = broadcast::channel(1);
        pending.insert(key.to_string(), tx);
        Ticket::Leader
    }

    /// Remove the entry for `key` and publish the outcome to followers.
    ///
    /// Must run on every exit path of a leader's fetch; a leaked entry would
    /// deduplicate all future requests into a result that never arrives.
    pub fn complete(&self, key: &str, outcome: FetchOutcome) {
        let tx = self.pending.lock().remove(key);
        if let Some(tx) = tx {
            // Send only fails when nobody joined, which is fine.
            let _ = tx.send(outcome);
        } else {
            debug!(key, "complete called with no pending entry");
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }
}

/// Await the leader's outcome as a follower.
pub async fn await_outcome(
    mut rx: broadcast::Receiver<FetchOutcome>,
) -> Result<WeatherSnapshot, WeatherError> {
    match rx.recv().await {
        Ok(outcome) => outcome,
        // The leader went away without publishing.
        Err(_) => Err(WeatherError::FetchFailed(
            "in-flight fetch was abandoned".into(),
        )),
    }
}
