use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::market::ledger::{Ledger, LedgerError};
use crate::market::odds::MarketEngine;
use crate::market::types::{BetSide, MarketSnapshot, Position};
use crate::race::publisher::StatePublisher;
use crate::race::types::RaceStatus;

/// Mirrors `GET /api/market-data`.
#[derive(Debug, Serialize)]
pub struct MarketDataResponse {
    pub status: RaceStatus,
    pub time: f64,
    pub score: f64,
    pub market: MarketSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Mirrors `POST /api/place-bet`.
#[derive(Debug, Serialize)]
pub struct PlaceBetResponse {
    pub position: Position,
    pub new_balance: f64,
    pub market: MarketSnapshot,
}

/// Mirrors `GET /api/user-positions`.
#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub balance: f64,
    pub positions: Vec<Position>,
}

/// Read/bet facade for whatever presentation layer hosts it (dashboard,
/// CLI, HTTP handler). Holds no state of its own; every response is derived
/// from the publisher and the ledger at call time.
pub struct Api {
    publisher: Arc<StatePublisher>,
    ledger: Arc<Ledger>,
    staleness_threshold: Duration,
}

impl Api {
    pub fn new(
        publisher: Arc<StatePublisher>,
        ledger: Arc<Ledger>,
        staleness_threshold: Duration,
    ) -> Self {
        Self {
            publisher,
            ledger,
            staleness_threshold,
        }
    }

    pub fn market_data(&self) -> MarketDataResponse {
        let snapshot = self
            .publisher
            .current()
            .stale_view(self.staleness_threshold);
        MarketDataResponse {
            status: snapshot.status,
            time: snapshot.elapsed_secs,
            score: snapshot.score,
            market: MarketEngine::compute_snapshot(&self.ledger),
            timestamp: Utc::now(),
        }
    }

    pub fn place_bet(
        &self,
        participant_id: &str,
        side: BetSide,
        amount: f64,
    ) -> Result<PlaceBetResponse, LedgerError> {
        let position = self.ledger.place_bet(participant_id, side, amount)?;
        let (new_balance, _) = self.ledger.participant_snapshot(participant_id);
        Ok(PlaceBetResponse {
            position,
            new_balance,
            market: MarketEngine::compute_snapshot(&self.ledger),
        })
    }

    pub fn participant_positions(&self, participant_id: &str) -> ParticipantResponse {
        let (balance, positions) = self.ledger.participant_snapshot(participant_id);
        ParticipantResponse { balance, positions }
    }
}
