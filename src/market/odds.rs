use crate::market::ledger::Ledger;
use crate::market::types::{BetSide, MarketSnapshot};

/// Pure derivation of live odds and volumes from ledger contents. No cached
/// state; recomputable at any time, so odds can never go stale or be read
/// mid-update.
pub struct MarketEngine;

impl MarketEngine {
    /// Aggregate OPEN positions only; settled positions no longer move the
    /// live market.
    pub fn compute_snapshot(ledger: &Ledger) -> MarketSnapshot {
        let mut success_volume = 0.0;
        let mut fail_volume = 0.0;
        for (_, position) in ledger.open_positions() {
            match position.side {
                BetSide::Success => success_volume += position.amount,
                BetSide::Fail => fail_volume += position.amount,
            }
        }

        let total_volume = success_volume + fail_volume;
        let (success_odds, fail_odds) = if total_volume == 0.0 {
            (50.0, 50.0)
        } else {
            let raw = 100.0 * success_volume / total_volume;
            (round1(raw), round1(100.0 - raw))
        };

        MarketSnapshot {
            success_volume,
            fail_volume,
            total_volume,
            success_odds,
            fail_odds,
            participant_count: ledger.bettor_count(),
        }
    }
}

/// One decimal place, display precision for odds.
fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_market_is_even_odds() {
        let ledger = Ledger::new(1000.0);
        let market = MarketEngine::compute_snapshot(&ledger);

        assert_eq!(market.total_volume, 0.0);
        assert_eq!(market.success_odds, 50.0);
        assert_eq!(market.fail_odds, 50.0);
        assert_eq!(market.participant_count, 0);
    }

    #[test]
    fn test_odds_follow_volume_split() {
        // 100 SUCCESS vs 300 FAIL -> 25.0 / 75.0.
        let ledger = Ledger::new(1000.0);
        ledger.place_bet("alice", BetSide::Success, 100.0).unwrap();
        ledger.place_bet("bob", BetSide::Fail, 300.0).unwrap();

        let market = MarketEngine::compute_snapshot(&ledger);
        assert_eq!(market.success_volume, 100.0);
        assert_eq!(market.fail_volume, 300.0);
        assert_eq!(market.success_odds, 25.0);
        assert_eq!(market.fail_odds, 75.0);
        assert_eq!(market.participant_count, 2);
    }

    #[test]
    fn test_odds_sum_to_100_within_rounding() {
        let ledger = Ledger::new(1000.0);
        ledger.place_bet("alice", BetSide::Success, 1.0).unwrap();
        ledger.place_bet("bob", BetSide::Fail, 2.0).unwrap();

        let market = MarketEngine::compute_snapshot(&ledger);
        assert_eq!(market.success_odds, 33.3);
        assert_eq!(market.fail_odds, 66.7);
        assert!((market.success_odds + market.fail_odds - 100.0).abs() < 0.1 + 1e-9);
    }

    #[test]
    fn test_settled_positions_do_not_move_odds() {
        let ledger = Ledger::new(1000.0);
        let settled = ledger.place_bet("alice", BetSide::Success, 500.0).unwrap();
        ledger.place_bet("bob", BetSide::Fail, 300.0).unwrap();
        ledger
            .settle_position("alice", settled.id, false, 0.0)
            .unwrap();

        let market = MarketEngine::compute_snapshot(&ledger);
        assert_eq!(market.success_volume, 0.0);
        assert_eq!(market.fail_volume, 300.0);
        assert_eq!(market.success_odds, 0.0);
        assert_eq!(market.fail_odds, 100.0);
        // Settled bettors still count as participants.
        assert_eq!(market.participant_count, 2);
    }
}
