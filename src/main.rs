mod api;
mod config;
mod demo;
mod market;
mod monitoring;
mod persistence;
mod race;
mod settlement;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use api::Api;
use config::{Config, EnvConfig};
use monitoring::logger::CsvLogger;
use race::publisher::StatePublisher;
use race::reader::StateReader;
use race::telemetry::TelemetryFeed;
use settlement::engine::SettlementEngine;
use settlement::notary::{HttpNotary, Notary, NullNotary};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("🤖 Olympimarket starting...");

    // Load configuration
    info!("Loading configuration...");
    let config = Config::load("config.toml")?;
    let env_config = EnvConfig::load()?;

    let demo_mode = env_config.demo_mode.unwrap_or(config.demo.enabled);
    let notary_url = env_config
        .notary_url
        .unwrap_or_else(|| config.settlement.notary_url.clone());
    info!("Demo mode: {}", demo_mode);
    info!("Notarization: {}", config.settlement.notary_enabled);

    // Restore persisted state
    let (restored_snapshot, ledger) = persistence::recover(
        &config.system.state_file,
        &config.system.ledger_file,
        config.market.initial_balance,
    );
    let ledger = Arc::new(ledger);
    let publisher = Arc::new(StatePublisher::with_initial(restored_snapshot));

    let staleness = chrono::Duration::seconds(config.race.staleness_threshold_secs as i64);
    let api = Arc::new(Api::new(publisher.clone(), ledger.clone(), staleness));

    let csv_logger = if config.system.csv_logging {
        Some(CsvLogger::new(config.system.csv_log_path.clone())?)
    } else {
        None
    };

    if demo_mode && ledger.bettor_count() == 0 {
        demo::seed_demo_bets(&ledger, config.demo.seed_users);
        if let Some(logger) = &csv_logger {
            for (participant_id, position) in ledger.open_positions() {
                if let Err(e) = logger.log_bet(&participant_id, &position) {
                    warn!("CSV log failed: {}", e);
                }
            }
        }
    }

    // Wire settlement to the terminal transition
    let settlement_engine = SettlementEngine::new(
        config.settlement.outcome_threshold_secs,
        config.settlement.max_retries,
    );
    let notary: Arc<dyn Notary> = if config.settlement.notary_enabled && !notary_url.is_empty() {
        Arc::new(HttpNotary::new(notary_url))
    } else {
        Arc::new(NullNotary)
    };

    let mut reader = StateReader::new(publisher.subscribe(), staleness);
    {
        let ledger = ledger.clone();
        let notary = notary.clone();
        let state_file = config.system.state_file.clone();
        let ledger_file = config.system.ledger_file.clone();
        reader.on_terminal_transition(move |snapshot| {
            let report = settlement_engine.settle(snapshot, &ledger);

            if let Some(logger) = &csv_logger {
                for settled in &report.settled {
                    if let Err(e) =
                        logger.log_settlement(&settled.participant_id, &settled.position)
                    {
                        warn!("CSV log failed: {}", e);
                    }
                }
                let _ = logger.log_event(&format!(
                    "HEAT_SETTLED outcome={:?} paid={:.2}",
                    report.outcome, report.total_paid
                ));
            }
            for failed in &report.failed {
                error!(
                    "Needs manual reconciliation: participant={} position={} ({})",
                    failed.participant_id, failed.position_id, failed.error
                );
            }

            // Crash-consistent checkpoint of the finished heat.
            if let Err(e) = persistence::store_snapshot(&state_file, snapshot) {
                error!("Failed to persist race state: {}", e);
            }
            if let Err(e) = persistence::store_ledger(&ledger_file, &ledger) {
                error!("Failed to persist ledger: {}", e);
            }

            // Non-fatal, fire-and-forget.
            notary.record(snapshot.score, snapshot.elapsed_secs);
        });
    }

    tokio::spawn(reader.run(Duration::from_millis(config.race.poll_interval_ms)));

    // Telemetry in: simulated heats, or frames handed over on stdin by the
    // serial bridge.
    if demo_mode {
        let simulator = demo::RaceSimulator::new(publisher.clone(), config.demo.clone());
        tokio::spawn(simulator.run());
    } else {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut lines = stdin.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
        tokio::spawn(TelemetryFeed::new(publisher.clone(), rx).run());
    }

    // Periodic market ticker for the terminal.
    {
        let api = api.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            loop {
                ticker.tick().await;
                let data = api.market_data();
                info!(
                    "{} t={:.1}s score={:.0} | YES {:.1}% / NO {:.1}% | volume {:.0} ({} bettors)",
                    data.status,
                    data.time,
                    data.score,
                    data.market.success_odds,
                    data.market.fail_odds,
                    data.market.total_volume,
                    data.market.participant_count
                );
            }
        });
    }

    info!("✅ Olympimarket initialized");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // Final checkpoint so a restart picks up where we left off.
    persistence::store_snapshot(&config.system.state_file, &publisher.current())?;
    persistence::store_ledger(&config.system.ledger_file, &ledger)?;

    Ok(())
}
