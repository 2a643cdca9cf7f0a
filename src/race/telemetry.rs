use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::race::publisher::StatePublisher;
use crate::race::types::RaceStatus;

/// One line from the telemetry source.
///
/// Progress frames: `STATE:<status>:<elapsed_secs>:<score>`
/// Terminal handshake (Arduino protocol, time in ms): `RECORD:<score>:<time_ms>`
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryFrame {
    State {
        status: RaceStatus,
        elapsed_secs: f64,
        score: f64,
        failure: bool,
    },
    Record {
        score: f64,
        time_ms: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognized frame: {0}")]
    UnknownPrefix(String),
    #[error("unknown race status: {0}")]
    UnknownStatus(String),
    #[error("bad {field} field: {value}")]
    BadField { field: &'static str, value: String },
    #[error("truncated frame: {0}")]
    Truncated(String),
}

pub fn parse_line(line: &str) -> Result<TelemetryFrame, ParseError> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("STATE:") {
        let mut parts = rest.splitn(3, ':');
        let status_str = parts.next().ok_or_else(|| ParseError::Truncated(line.to_string()))?;
        let elapsed_str = parts.next().ok_or_else(|| ParseError::Truncated(line.to_string()))?;
        let score_str = parts.next().ok_or_else(|| ParseError::Truncated(line.to_string()))?;

        let (status, failure) = parse_status(status_str)?;
        let elapsed_secs: f64 = elapsed_str.parse().map_err(|_| ParseError::BadField {
            field: "elapsed",
            value: elapsed_str.to_string(),
        })?;
        let score: f64 = score_str.parse().map_err(|_| ParseError::BadField {
            field: "score",
            value: score_str.to_string(),
        })?;

        Ok(TelemetryFrame::State {
            status,
            elapsed_secs,
            score,
            failure,
        })
    } else if let Some(rest) = line.strip_prefix("RECORD:") {
        let mut parts = rest.splitn(2, ':');
        let score_str = parts.next().ok_or_else(|| ParseError::Truncated(line.to_string()))?;
        let time_str = parts.next().ok_or_else(|| ParseError::Truncated(line.to_string()))?;

        let score: f64 = score_str.parse().map_err(|_| ParseError::BadField {
            field: "score",
            value: score_str.to_string(),
        })?;
        let time_ms: u64 = time_str.parse().map_err(|_| ParseError::BadField {
            field: "time_ms",
            value: time_str.to_string(),
        })?;

        Ok(TelemetryFrame::Record { score, time_ms })
    } else {
        Err(ParseError::UnknownPrefix(line.to_string()))
    }
}

fn parse_status(s: &str) -> Result<(RaceStatus, bool), ParseError> {
    // READY/RUNNING are the robot-side names for WAITING/RACING.
    match s {
        "WAITING" | "READY" => Ok((RaceStatus::Waiting, false)),
        "RACING" | "RUNNING" => Ok((RaceStatus::Racing, false)),
        "FINISHED" => Ok((RaceStatus::Finished, false)),
        "CRASHED" => Ok((RaceStatus::Finished, true)),
        "OFFLINE" => Ok((RaceStatus::Offline, false)),
        other => Err(ParseError::UnknownStatus(other.to_string())),
    }
}

/// Drains raw telemetry lines into the publisher. Malformed lines are logged
/// and skipped; the feed itself never fails.
pub struct TelemetryFeed {
    publisher: Arc<StatePublisher>,
    lines: mpsc::Receiver<String>,
}

impl TelemetryFeed {
    pub fn new(publisher: Arc<StatePublisher>, lines: mpsc::Receiver<String>) -> Self {
        Self { publisher, lines }
    }

    pub async fn run(mut self) {
        info!("Telemetry feed started");
        while let Some(line) = self.lines.recv().await {
            self.apply_line(&line);
        }
        info!("Telemetry feed closed");
    }

    fn apply_line(&self, line: &str) {
        let frame = match parse_line(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping telemetry line: {}", e);
                return;
            }
        };

        let result = match frame {
            TelemetryFrame::State {
                status,
                elapsed_secs,
                score,
                failure,
            } => self.publisher.publish(status, elapsed_secs, score, failure),
            TelemetryFrame::Record { score, time_ms } => {
                // The terminal handshake carries the frozen final result.
                self.publisher
                    .publish(RaceStatus::Finished, time_ms as f64 / 1000.0, score, false)
            }
        };

        if let Err(e) = result {
            warn!("Rejected telemetry frame: {}", e);
        }
    }
}
