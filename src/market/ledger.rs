use std::collections::BTreeMap;

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::market::types::{BetSide, Participant, Position, PositionStatus};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid amount: {0:.2}")]
    InvalidAmount(f64),

    #[error("Insufficient balance: need {needed:.2}, have {available:.2}")]
    InsufficientBalance { needed: f64, available: f64 },

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Unknown position: {0}")]
    UnknownPosition(Uuid),

    #[error("Position {0} is not open")]
    PositionNotOpen(Uuid),
}

/// Balances and positions for every participant. Each mutation runs under
/// the participant's map entry lock, so a deduction and its position append
/// are one atomic step and two mutations on the same participant never
/// interleave, while other participants proceed in parallel.
pub struct Ledger {
    accounts: DashMap<String, Participant>,
    initial_balance: f64,
}

impl Ledger {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            accounts: DashMap::new(),
            initial_balance,
        }
    }

    /// Idempotent: creates the participant with the initial grant on first
    /// appearance, returns the existing one otherwise.
    pub fn ensure_participant(&self, id: &str) -> Participant {
        self.accounts
            .entry(id.to_string())
            .or_insert_with(|| Participant::new(id, self.initial_balance))
            .clone()
    }

    /// Deduct the stake and append an OPEN position as a single atomic step.
    /// Validation failures reject the bet before any mutation.
    pub fn place_bet(
        &self,
        participant_id: &str,
        side: BetSide,
        amount: f64,
    ) -> Result<Position, LedgerError> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut account = self
            .accounts
            .entry(participant_id.to_string())
            .or_insert_with(|| Participant::new(participant_id, self.initial_balance));

        if amount > account.balance {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available: account.balance,
            });
        }

        let position = Position {
            id: Uuid::new_v4(),
            side,
            amount,
            placed_at: Utc::now(),
            status: PositionStatus::Open,
            payout: None,
        };

        account.balance -= amount;
        account.positions.push(position.clone());

        info!(
            "Bet placed: participant={} side={:?} amount={:.2} balance={:.2}",
            participant_id, side, amount, account.balance
        );
        Ok(position)
    }

    /// Resolve one position. OPEN -> WON credits `amount * multiplier` back
    /// to the balance; OPEN -> LOST credits nothing. Anything else is
    /// `PositionNotOpen`, which makes settlement idempotent per position.
    /// Returns the credited amount.
    pub fn settle_position(
        &self,
        participant_id: &str,
        position_id: Uuid,
        won: bool,
        multiplier: f64,
    ) -> Result<f64, LedgerError> {
        let mut account = self
            .accounts
            .get_mut(participant_id)
            .ok_or_else(|| LedgerError::UnknownParticipant(participant_id.to_string()))?;

        let idx = account
            .positions
            .iter()
            .position(|p| p.id == position_id)
            .ok_or(LedgerError::UnknownPosition(position_id))?;

        if account.positions[idx].status != PositionStatus::Open {
            return Err(LedgerError::PositionNotOpen(position_id));
        }

        let credit = if won {
            account.positions[idx].amount * multiplier
        } else {
            0.0
        };
        account.positions[idx].status = if won {
            PositionStatus::Won
        } else {
            PositionStatus::Lost
        };
        account.positions[idx].payout = Some(credit);
        account.balance += credit;

        Ok(credit)
    }

    /// Point-in-time consistent view of one participant. Unknown ids get the
    /// default empty view (initial grant, no positions) without creating one.
    pub fn participant_snapshot(&self, participant_id: &str) -> (f64, Vec<Position>) {
        match self.accounts.get(participant_id) {
            Some(account) => (account.balance, account.positions.clone()),
            None => (self.initial_balance, Vec::new()),
        }
    }

    /// Every OPEN position, tagged with its owner. Clones; used by the
    /// market engine and the settlement sweep.
    pub fn open_positions(&self) -> Vec<(String, Position)> {
        let mut open = Vec::new();
        for account in self.accounts.iter() {
            for position in &account.positions {
                if position.status == PositionStatus::Open {
                    open.push((account.id.clone(), position.clone()));
                }
            }
        }
        open
    }

    /// Distinct participants holding at least one position, open or settled.
    pub fn bettor_count(&self) -> usize {
        self.accounts
            .iter()
            .filter(|a| !a.positions.is_empty())
            .count()
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Full dump for persistence, in a stable key order.
    pub fn export(&self) -> BTreeMap<String, Participant> {
        self.accounts
            .iter()
            .map(|a| (a.key().clone(), a.value().clone()))
            .collect()
    }

    pub fn import(initial_balance: f64, accounts: BTreeMap<String, Participant>) -> Self {
        let ledger = Self::new(initial_balance);
        for (id, participant) in accounts {
            ledger.accounts.insert(id, participant);
        }
        ledger
    }
}
