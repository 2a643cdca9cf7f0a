use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which race outcome a bet backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetSide {
    Success,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Won,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub side: BetSide,
    /// Stake, fixed at placement. Already deducted from the balance.
    pub amount: f64,
    pub placed_at: DateTime<Utc>,
    pub status: PositionStatus,
    /// Credit received at settlement. None while open.
    pub payout: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub balance: f64,
    /// Insertion order = placement order.
    pub positions: Vec<Position>,
}

impl Participant {
    pub fn new(id: &str, initial_balance: f64) -> Self {
        Self {
            id: id.to_string(),
            balance: initial_balance,
            positions: Vec::new(),
        }
    }
}

/// Derived market view, recomputed on demand from open positions. Odds are
/// rounded to one decimal for display; volumes stay exact for settlement.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub success_volume: f64,
    pub fail_volume: f64,
    pub total_volume: f64,
    pub success_odds: f64,
    pub fail_odds: f64,
    pub participant_count: usize,
}
