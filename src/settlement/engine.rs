use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::market::ledger::{Ledger, LedgerError};
use crate::market::types::{BetSide, Position};
use crate::race::types::RaceSnapshot;

#[derive(Debug, Clone)]
pub struct SettledPosition {
    pub participant_id: String,
    pub position: Position,
    pub credit: f64,
}

/// A position that could not be settled within the retry budget. Surfaced
/// for manual reconciliation rather than silently dropped.
#[derive(Debug, Clone)]
pub struct FailedSettlement {
    pub participant_id: String,
    pub position_id: Uuid,
    pub error: String,
}

#[derive(Debug)]
pub struct SettlementReport {
    pub outcome: BetSide,
    pub multiplier: f64,
    pub winners: usize,
    pub losers: usize,
    pub total_paid: f64,
    pub settled: Vec<SettledPosition>,
    pub failed: Vec<FailedSettlement>,
}

/// Resolves every open position against the race outcome, exactly once per
/// heat. Payout is pari-mutuel: winners split the losing pool proportionally
/// to stake, on top of their own stake back.
pub struct SettlementEngine {
    outcome_threshold_secs: f64,
    max_retries: u32,
}

impl SettlementEngine {
    pub fn new(outcome_threshold_secs: f64, max_retries: u32) -> Self {
        Self {
            outcome_threshold_secs,
            max_retries,
        }
    }

    /// Fixed outcome rule: SUCCESS iff the run beat the threshold and the
    /// robot did not crash.
    pub fn outcome_for(&self, snapshot: &RaceSnapshot) -> BetSide {
        if snapshot.elapsed_secs < self.outcome_threshold_secs && !snapshot.failure {
            BetSide::Success
        } else {
            BetSide::Fail
        }
    }

    /// Sweep every open position. Idempotent at the system level: a second
    /// invocation for the same terminal snapshot finds no open positions and
    /// mutates nothing. One failing position never blocks the others.
    pub fn settle(&self, snapshot: &RaceSnapshot, ledger: &Ledger) -> SettlementReport {
        let outcome = self.outcome_for(snapshot);
        let open = ledger.open_positions();

        // Volumes at settlement time, exact (not the rounded display odds).
        let winning_volume: f64 = open
            .iter()
            .filter(|(_, p)| p.side == outcome)
            .map(|(_, p)| p.amount)
            .sum();
        let total_volume: f64 = open.iter().map(|(_, p)| p.amount).sum();

        // total/winning == 100/odds_of_winning_side. 1.0 when nobody bet
        // against the outcome (stake refund); irrelevant when nobody won.
        let multiplier = if winning_volume > 0.0 {
            total_volume / winning_volume
        } else {
            0.0
        };

        info!(
            "Settling heat: outcome={:?} open={} pool={:.2} multiplier={:.4}",
            outcome,
            open.len(),
            total_volume,
            multiplier
        );

        let mut report = SettlementReport {
            outcome,
            multiplier,
            winners: 0,
            losers: 0,
            total_paid: 0.0,
            settled: Vec::new(),
            failed: Vec::new(),
        };

        for (participant_id, position) in open {
            let won = position.side == outcome;
            self.settle_one(ledger, &participant_id, &position, won, multiplier, &mut report);
        }

        info!(
            "Settlement complete: {} won, {} lost, {:.2} paid out, {} unresolved",
            report.winners,
            report.losers,
            report.total_paid,
            report.failed.len()
        );
        report
    }

    fn settle_one(
        &self,
        ledger: &Ledger,
        participant_id: &str,
        position: &Position,
        won: bool,
        multiplier: f64,
        report: &mut SettlementReport,
    ) {
        let mut last_error = None;
        for attempt in 0..self.max_retries {
            match ledger.settle_position(participant_id, position.id, won, multiplier) {
                Ok(credit) => {
                    if won {
                        report.winners += 1;
                        report.total_paid += credit;
                    } else {
                        report.losers += 1;
                    }
                    let mut settled = position.clone();
                    settled.status = if won {
                        crate::market::types::PositionStatus::Won
                    } else {
                        crate::market::types::PositionStatus::Lost
                    };
                    settled.payout = Some(credit);
                    report.settled.push(SettledPosition {
                        participant_id: participant_id.to_string(),
                        position: settled,
                        credit,
                    });
                    return;
                }
                Err(LedgerError::PositionNotOpen(id)) => {
                    // Already resolved, e.g. a duplicate terminal trigger
                    // that slipped past upstream de-duplication.
                    debug!("Position {} already settled, skipping", id);
                    return;
                }
                Err(e) => {
                    warn!(
                        "Settlement attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        self.max_retries,
                        position.id,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "retry budget exhausted".to_string());
        error!(
            "Settlement retries exhausted for participant={} position={}: {}",
            participant_id, position.id, error
        );
        report.failed.push(FailedSettlement {
            participant_id: participant_id.to_string(),
            position_id: position.id,
            error,
        });
    }
}
