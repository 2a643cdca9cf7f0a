use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use crate::race::types::{RaceSnapshot, RaceStatus};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("negative {field}: {value}")]
    NegativeField { field: &'static str, value: f64 },
}

/// Single-writer publication point for race state. Built on a watch channel:
/// each publish replaces the whole snapshot atomically, so a reader gets
/// either the previous complete value or the new one, never a mix.
pub struct StatePublisher {
    tx: watch::Sender<RaceSnapshot>,
}

impl StatePublisher {
    pub fn new() -> Self {
        Self::with_initial(RaceSnapshot::offline())
    }

    /// Start from a restored snapshot (crash recovery) instead of OFFLINE.
    pub fn with_initial(snapshot: RaceSnapshot) -> Self {
        let (tx, _rx) = watch::channel(snapshot);
        Self { tx }
    }

    /// Commit a new snapshot. Rejects negative time/score; otherwise accepts
    /// tuples as given, including duplicates and out-of-order deliveries
    /// (ordering correction is the telemetry source's responsibility).
    pub fn publish(
        &self,
        status: RaceStatus,
        elapsed_secs: f64,
        score: f64,
        failure: bool,
    ) -> Result<(), PublishError> {
        if elapsed_secs < 0.0 {
            return Err(PublishError::NegativeField {
                field: "elapsed_secs",
                value: elapsed_secs,
            });
        }
        if score < 0.0 {
            return Err(PublishError::NegativeField {
                field: "score",
                value: score,
            });
        }

        // Time and score are only defined while RACING/FINISHED.
        let (elapsed_secs, score) = match status {
            RaceStatus::Racing | RaceStatus::Finished => (elapsed_secs, score),
            RaceStatus::Waiting | RaceStatus::Offline => (0.0, 0.0),
        };

        let snapshot = RaceSnapshot {
            status,
            elapsed_secs,
            score,
            failure,
            published_at: Utc::now(),
        };

        debug!(
            "Published snapshot: {} t={:.1}s score={:.0}",
            snapshot.status, snapshot.elapsed_secs, snapshot.score
        );
        self.tx.send_replace(snapshot);
        Ok(())
    }

    /// Latest committed snapshot. Never blocks, never fails.
    pub fn current(&self) -> RaceSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RaceSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}
