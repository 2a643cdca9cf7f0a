use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::config::DemoConfig;
use crate::market::ledger::Ledger;
use crate::market::types::BetSide;
use crate::race::publisher::StatePublisher;
use crate::race::types::RaceStatus;

/// Stand-in for the physical telemetry source: cycles Waiting -> Racing ->
/// Finished heats with randomized results so the market can be exercised
/// without a robot on the track. Development convenience only; none of the
/// core's correctness depends on it.
pub struct RaceSimulator {
    publisher: Arc<StatePublisher>,
    config: DemoConfig,
}

impl RaceSimulator {
    pub fn new(publisher: Arc<StatePublisher>, config: DemoConfig) -> Self {
        Self { publisher, config }
    }

    pub async fn run(self) {
        info!("Demo race simulator started");
        loop {
            if let Err(e) = self.run_heat().await {
                warn!("Simulator publish rejected: {}", e);
            }
        }
    }

    async fn run_heat(&self) -> Result<(), crate::race::publisher::PublishError> {
        let pause = Duration::from_secs(self.config.heat_pause_secs);
        let tick = Duration::from_millis(self.config.tick_ms);
        let tick_secs = tick.as_secs_f64();

        self.publisher
            .publish(RaceStatus::Waiting, 0.0, 0.0, false)?;
        tokio::time::sleep(pause).await;

        // Heat results mimic the observed robot runs: some beat the 45s
        // threshold, some do not, a few crash outright.
        let (final_time, crashed) = {
            let mut rng = rand::thread_rng();
            let times = [32.0, 38.0, 45.0, 52.0];
            (
                times[rng.gen_range(0..times.len())],
                rng.gen::<f64>() < self.config.crash_rate,
            )
        };

        let mut elapsed = 0.0;
        while elapsed < final_time {
            tokio::time::sleep(tick).await;
            elapsed = (elapsed + tick_secs).min(final_time);
            let jitter: f64 = rand::thread_rng().gen_range(-50.0..100.0);
            let score = (elapsed * 12.0 + jitter).max(0.0);
            self.publisher
                .publish(RaceStatus::Racing, elapsed, score, false)?;
        }

        let final_score = if crashed {
            final_time * 4.0
        } else if final_time < 45.0 {
            final_time * 12.0
        } else {
            final_time * 8.0
        };
        self.publisher
            .publish(RaceStatus::Finished, final_time, final_score, crashed)?;
        info!(
            "Demo heat finished: t={:.0}s score={:.0} crashed={}",
            final_time, final_score, crashed
        );
        tokio::time::sleep(pause).await;
        Ok(())
    }
}

/// Populate the ledger with demo bettors, each holding 1-3 random open
/// positions. Goes through `place_bet` so every demo balance stays
/// consistent with its positions.
pub fn seed_demo_bets(ledger: &Ledger, users: usize) {
    let mut rng = rand::thread_rng();
    for i in 0..users {
        let participant_id = format!("demo-user-{}", i);
        for _ in 0..rng.gen_range(1..=3) {
            let side = if rng.gen_bool(0.5) {
                BetSide::Success
            } else {
                BetSide::Fail
            };
            let amount = rng.gen_range(50..=300) as f64;
            if let Err(e) = ledger.place_bet(&participant_id, side, amount) {
                warn!("Demo bet skipped for {}: {}", participant_id, e);
            }
        }
    }
    info!("Seeded demo bets for {} users", users);
}
