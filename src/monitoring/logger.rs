use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;

use crate::market::types::Position;

/// Append-only CSV audit trail of bets and settlements.
pub struct CsvLogger {
    log_path: String,
}

impl CsvLogger {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !std::path::Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)?;

            writeln!(
                file,
                "timestamp,event,participant,position_id,side,amount,payout,status"
            )?;
        }

        Ok(Self { log_path })
    }

    /// Log a freshly placed bet
    pub fn log_bet(&self, participant_id: &str, position: &Position) -> Result<()> {
        self.append(&format!(
            "{},BET,{},{},{:?},{:.2},,OPEN",
            position.placed_at.to_rfc3339(),
            participant_id,
            position.id,
            position.side,
            position.amount,
        ))
    }

    /// Log a settled position
    pub fn log_settlement(&self, participant_id: &str, position: &Position) -> Result<()> {
        let payout_str = match position.payout {
            Some(payout) => format!("{:.2}", payout),
            None => String::new(),
        };

        self.append(&format!(
            "{},SETTLE,{},{},{:?},{:.2},{},{:?}",
            Utc::now().to_rfc3339(),
            participant_id,
            position.id,
            position.side,
            position.amount,
            payout_str,
            position.status,
        ))
    }

    /// Log a free-form event (heat finished, retries exhausted, ...)
    pub fn log_event(&self, event: &str) -> Result<()> {
        self.append(&format!("{},EVENT,{},,,,,", Utc::now().to_rfc3339(), event))
    }

    fn append(&self, row: &str) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.log_path)?;
        writeln!(file, "{}", row)?;
        Ok(())
    }
}
