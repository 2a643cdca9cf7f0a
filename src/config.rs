use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    pub race: RaceConfig,
    pub market: MarketConfig,
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub state_file: String,
    pub ledger_file: String,
    pub csv_logging: bool,
    pub csv_log_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceConfig {
    /// No update for this long while non-terminal -> consumers see OFFLINE.
    pub staleness_threshold_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub initial_balance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// A run under this many seconds counts as SUCCESS.
    pub outcome_threshold_secs: f64,
    pub max_retries: u32,
    pub notary_enabled: bool,
    #[serde(default)]
    pub notary_url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DemoConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_heat_pause")]
    pub heat_pause_secs: u64,
    #[serde(default = "default_crash_rate")]
    pub crash_rate: f64,
    #[serde(default = "default_demo_users")]
    pub seed_users: usize,
}

fn default_tick_ms() -> u64 { 500 }
fn default_heat_pause() -> u64 { 5 }
fn default_crash_rate() -> f64 { 0.1 }
fn default_demo_users() -> usize { 10 }

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub demo_mode: Option<bool>,
    pub notary_url: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            demo_mode: std::env::var("DEMO_MODE")
                .ok()
                .and_then(|v| v.parse().ok()),
            notary_url: std::env::var("NOTARY_URL").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [system]
            state_file = "race_state.json"
            ledger_file = "bets.json"
            csv_logging = true
            csv_log_path = "trades.csv"

            [race]
            staleness_threshold_secs = 10
            poll_interval_ms = 500

            [market]
            initial_balance = 1000.0

            [settlement]
            outcome_threshold_secs = 45.0
            max_retries = 3
            notary_enabled = false

            [demo]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.market.initial_balance, 1000.0);
        assert_eq!(config.settlement.outcome_threshold_secs, 45.0);
        assert!(config.demo.enabled);
        // Unspecified demo fields take their defaults.
        assert_eq!(config.demo.tick_ms, 500);
        assert_eq!(config.demo.seed_users, 10);
    }

    #[test]
    fn test_demo_section_is_optional() {
        let config: Config = toml::from_str(
            r#"
            [system]
            state_file = "race_state.json"
            ledger_file = "bets.json"
            csv_logging = false
            csv_log_path = "trades.csv"

            [race]
            staleness_threshold_secs = 10
            poll_interval_ms = 500

            [market]
            initial_balance = 1000.0

            [settlement]
            outcome_threshold_secs = 45.0
            max_retries = 3
            notary_enabled = false
            "#,
        )
        .unwrap();

        assert!(!config.demo.enabled);
    }
}
