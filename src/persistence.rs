use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::market::ledger::Ledger;
use crate::market::types::Participant;
use crate::race::types::RaceSnapshot;

/// Replace-whole-file-atomically: serialize next to the target and rename
/// into place, so a reader or a restarted process never observes a
/// half-written file.
fn atomic_write(path: &str, bytes: &[u8]) -> Result<()> {
    let tmp = format!("{}.tmp", path);
    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path))?;
    Ok(())
}

pub fn store_snapshot(path: &str, snapshot: &RaceSnapshot) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(snapshot).context("Failed to serialize race state")?;
    atomic_write(path, &bytes)
}

/// Missing or unreadable state falls back to the OFFLINE default.
pub fn load_snapshot(path: &str) -> RaceSnapshot {
    if !Path::new(path).exists() {
        return RaceSnapshot::offline();
    }
    match fs::read(path)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(anyhow::Error::from))
    {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Could not restore race state from {}: {}", path, e);
            RaceSnapshot::offline()
        }
    }
}

pub fn store_ledger(path: &str, ledger: &Ledger) -> Result<()> {
    let accounts = ledger.export();
    let bytes = serde_json::to_vec_pretty(&accounts).context("Failed to serialize ledger")?;
    atomic_write(path, &bytes)
}

/// Missing or unreadable ledger falls back to an empty one.
pub fn load_ledger(path: &str, initial_balance: f64) -> Ledger {
    if !Path::new(path).exists() {
        return Ledger::new(initial_balance);
    }
    match fs::read(path)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| {
            serde_json::from_slice::<BTreeMap<String, Participant>>(&bytes)
                .map_err(anyhow::Error::from)
        }) {
        Ok(accounts) => Ledger::import(initial_balance, accounts),
        Err(e) => {
            warn!("Could not restore ledger from {}: {}", path, e);
            Ledger::new(initial_balance)
        }
    }
}

/// Startup recovery: restore both files and report what came back.
pub fn recover(
    state_path: &str,
    ledger_path: &str,
    initial_balance: f64,
) -> (RaceSnapshot, Ledger) {
    info!("Performing crash recovery...");

    let snapshot = load_snapshot(state_path);
    let ledger = load_ledger(ledger_path, initial_balance);

    let open = ledger.open_positions().len();
    info!(
        "Restored race state: {} (published {})",
        snapshot.status, snapshot.published_at
    );
    info!(
        "Restored ledger: {} participants, {} open positions",
        ledger.export().len(),
        open
    );

    (snapshot, ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::BetSide;
    use crate::race::types::RaceStatus;
    use chrono::Utc;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("olympimarket-{}-{}.json", name, uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_snapshot_round_trip() {
        let path = temp_path("state");
        let snapshot = RaceSnapshot {
            status: RaceStatus::Finished,
            elapsed_secs: 38.0,
            score: 456.0,
            failure: false,
            published_at: Utc::now(),
        };

        store_snapshot(&path, &snapshot).unwrap();
        let restored = load_snapshot(&path);
        assert_eq!(restored.status, RaceStatus::Finished);
        assert_eq!(restored.elapsed_secs, 38.0);
        assert_eq!(restored.score, 456.0);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_ledger_round_trip() {
        let path = temp_path("ledger");
        let ledger = Ledger::new(1000.0);
        ledger.place_bet("alice", BetSide::Success, 100.0).unwrap();
        ledger.place_bet("bob", BetSide::Fail, 300.0).unwrap();

        store_ledger(&path, &ledger).unwrap();
        let restored = load_ledger(&path, 1000.0);
        assert_eq!(restored.participant_snapshot("alice").0, 900.0);
        assert_eq!(restored.participant_snapshot("bob").0, 700.0);
        assert_eq!(restored.open_positions().len(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let snapshot = load_snapshot("/nonexistent/race_state.json");
        assert_eq!(snapshot.status, RaceStatus::Offline);

        let ledger = load_ledger("/nonexistent/bets.json", 1000.0);
        assert_eq!(ledger.open_positions().len(), 0);
        assert_eq!(ledger.initial_balance(), 1000.0);
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let path = temp_path("corrupt");
        fs::write(&path, b"{ not json").unwrap();

        let snapshot = load_snapshot(&path);
        assert_eq!(snapshot.status, RaceStatus::Offline);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_store_replaces_previous_content() {
        let path = temp_path("replace");
        let mut snapshot = RaceSnapshot::offline();
        store_snapshot(&path, &snapshot).unwrap();

        snapshot.status = RaceStatus::Racing;
        snapshot.elapsed_secs = 5.0;
        store_snapshot(&path, &snapshot).unwrap();

        let restored = load_snapshot(&path);
        assert_eq!(restored.status, RaceStatus::Racing);
        // No leftover temp file once the rename landed.
        assert!(!Path::new(&format!("{}.tmp", path)).exists());

        fs::remove_file(&path).unwrap();
    }
}
