use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RaceStatus {
    Waiting,
    Racing,
    Finished,
    Offline,
}

impl RaceStatus {
    /// Terminal: no further time/score updates until the next heat.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RaceStatus::Finished)
    }
}

impl std::fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RaceStatus::Waiting => "WAITING",
            RaceStatus::Racing => "RACING",
            RaceStatus::Finished => "FINISHED",
            RaceStatus::Offline => "OFFLINE",
        };
        write!(f, "{}", s)
    }
}

/// Immutable view of the race at one instant. Replaced wholesale on each
/// publish; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    /// Seconds since race start. Frozen at FINISHED, 0 outside RACING/FINISHED.
    pub elapsed_secs: f64,
    /// Accumulated points. Frozen at FINISHED, 0 outside RACING/FINISHED.
    pub score: f64,
    /// Set when the robot crashed or was disqualified mid-run.
    pub failure: bool,
    pub published_at: DateTime<Utc>,
}

impl RaceSnapshot {
    /// The default view before anything has ever been published.
    pub fn offline() -> Self {
        Self {
            status: RaceStatus::Offline,
            elapsed_secs: 0.0,
            score: 0.0,
            failure: false,
            published_at: Utc::now(),
        }
    }

    /// Consumer-side staleness policy: a non-terminal snapshot that has not
    /// been refreshed within `threshold` is presented as OFFLINE. The stored
    /// snapshot itself is untouched.
    pub fn stale_view(&self, threshold: Duration) -> RaceSnapshot {
        if self.status == RaceStatus::Offline || self.status.is_terminal() {
            return self.clone();
        }

        if Utc::now().signed_duration_since(self.published_at) > threshold {
            RaceSnapshot {
                status: RaceStatus::Offline,
                elapsed_secs: 0.0,
                score: 0.0,
                failure: false,
                published_at: self.published_at,
            }
        } else {
            self.clone()
        }
    }
}

impl Default for RaceSnapshot {
    fn default() -> Self {
        Self::offline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_offline() {
        let snap = RaceSnapshot::default();
        assert_eq!(snap.status, RaceStatus::Offline);
        assert_eq!(snap.elapsed_secs, 0.0);
        assert_eq!(snap.score, 0.0);
        assert!(!snap.failure);
    }

    #[test]
    fn test_only_finished_is_terminal() {
        assert!(RaceStatus::Finished.is_terminal());
        assert!(!RaceStatus::Waiting.is_terminal());
        assert!(!RaceStatus::Racing.is_terminal());
        assert!(!RaceStatus::Offline.is_terminal());
    }

    #[test]
    fn test_stale_view_coerces_old_racing_snapshot() {
        let snap = RaceSnapshot {
            status: RaceStatus::Racing,
            elapsed_secs: 12.0,
            score: 144.0,
            failure: false,
            published_at: Utc::now() - Duration::seconds(30),
        };

        let view = snap.stale_view(Duration::seconds(10));
        assert_eq!(view.status, RaceStatus::Offline);
        assert_eq!(view.elapsed_secs, 0.0);
        assert_eq!(view.score, 0.0);
    }

    #[test]
    fn test_stale_view_keeps_fresh_snapshot() {
        let snap = RaceSnapshot {
            status: RaceStatus::Racing,
            elapsed_secs: 12.0,
            score: 144.0,
            failure: false,
            published_at: Utc::now(),
        };

        let view = snap.stale_view(Duration::seconds(10));
        assert_eq!(view.status, RaceStatus::Racing);
        assert_eq!(view.elapsed_secs, 12.0);
    }

    #[test]
    fn test_stale_view_never_hides_terminal_state() {
        // Settlement correctness depends on FINISHED staying visible no
        // matter how old the snapshot is.
        let snap = RaceSnapshot {
            status: RaceStatus::Finished,
            elapsed_secs: 38.0,
            score: 456.0,
            failure: false,
            published_at: Utc::now() - Duration::hours(1),
        };

        let view = snap.stale_view(Duration::seconds(10));
        assert_eq!(view.status, RaceStatus::Finished);
        assert_eq!(view.elapsed_secs, 38.0);
    }
}
