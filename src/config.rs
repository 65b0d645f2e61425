//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the wallet pubkey for the activation check) are referenced by
//! env-var name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub venue: VenueConfig,
    pub model: ModelConfig,
    pub scoring: ScoringConfig,
    pub store: StoreConfig,
    pub license: LicenseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Process-wide live/simulation switch, fixed at startup.
    #[serde(default)]
    pub live_mode: bool,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Candidates below this liquidity are recorded but never published.
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between candidates within one cycle, to respect rate limits.
    #[serde(default = "default_item_delay")]
    pub item_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VenueConfig {
    /// Token API base, e.g. https://api.jup.ag/tokens/v1
    pub token_api_base: String,
    /// Quote API base, e.g. https://quote-api.jup.ag/v6
    pub quote_api_base: String,
    /// Mint address of the base asset new tokens are quoted against.
    pub base_mint: String,
    /// Shallow probe size in base-asset atomic units (detection gate).
    #[serde(default = "default_probe_amount")]
    pub probe_amount: u64,
    /// Deep probe size in base-asset atomic units (enrichment).
    #[serde(default = "default_deep_probe_amount")]
    pub deep_probe_amount: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_initial_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// AI scoring oracle base URL (exposes POST /predict).
    pub url: String,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    /// "process" or "http".
    pub transport: String,
    /// Process transport: where the feature map is written.
    #[serde(default)]
    pub input_path: Option<String>,
    /// Process transport: the scoring executable.
    #[serde(default)]
    pub executable: Option<String>,
    /// HTTP transport: the scoring endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_scoring_attempts")]
    pub attempts: usize,
    #[serde(default = "default_scoring_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_scoring_timeout")]
    pub timeout_secs: u64,
    /// Score above which the hybrid strategy matches.
    #[serde(default = "default_hybrid_threshold")]
    pub hybrid_threshold: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: String,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LicenseConfig {
    /// Backend exposing GET /api/check/{pubkey}.
    pub backend_url: String,
    /// Env var holding the wallet public key to check in live mode.
    pub wallet_pubkey_env: String,
}

fn default_scan_interval() -> u64 {
    15
}
fn default_min_liquidity() -> f64 {
    1.0
}
fn default_batch_size() -> usize {
    100
}
fn default_item_delay() -> u64 {
    200
}
fn default_probe_amount() -> u64 {
    1_000_000 // 0.001 of the base asset at 9 decimals
}
fn default_deep_probe_amount() -> u64 {
    1_000_000_000 // 1.0 of the base asset at 9 decimals
}
fn default_slippage_bps() -> u32 {
    1000
}
fn default_retry_attempts() -> usize {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_model_timeout() -> u64 {
    5
}
fn default_scoring_attempts() -> usize {
    3
}
fn default_scoring_retry_delay() -> u64 {
    250
}
fn default_scoring_timeout() -> u64 {
    5
}
fn default_hybrid_threshold() -> f64 {
    0.75
}
fn default_connect_attempts() -> usize {
    5
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [agent]
        name = "MINTWATCH-001"

        [venue]
        token_api_base = "https://api.jup.ag/tokens/v1"
        quote_api_base = "https://quote-api.jup.ag/v6"
        base_mint = "So11111111111111111111111111111111111111112"

        [model]
        url = "http://ai_model:8000"

        [scoring]
        transport = "http"
        url = "http://scorer:8080/score"

        [store]
        path = "mintwatch.db"

        [license]
        backend_url = "http://localhost:4000"
        wallet_pubkey_env = "WALLET_PUBKEY"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(cfg.agent.scan_interval_secs, 15);
        assert_eq!(cfg.agent.min_liquidity, 1.0);
        assert_eq!(cfg.agent.batch_size, 100);
        assert!(!cfg.agent.live_mode);
        assert_eq!(cfg.venue.retry_attempts, 3);
        assert_eq!(cfg.venue.retry_initial_delay_ms, 1000);
        assert_eq!(cfg.model.timeout_secs, 5);
        assert_eq!(cfg.scoring.attempts, 3);
        assert_eq!(cfg.scoring.hybrid_threshold, 0.75);
        assert_eq!(cfg.store.connect_attempts, 5);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let toml_src = MINIMAL.replace(
            "name = \"MINTWATCH-001\"",
            "name = \"MINTWATCH-001\"\nlive_mode = true\nscan_interval_secs = 30\nmin_liquidity = 2.5",
        );
        let cfg: AppConfig = toml::from_str(&toml_src).unwrap();
        assert!(cfg.agent.live_mode);
        assert_eq!(cfg.agent.scan_interval_secs, 30);
        assert_eq!(cfg.agent.min_liquidity, 2.5);
    }

    #[test]
    fn test_missing_section_fails() {
        let broken = MINIMAL.replace("[store]", "[storage]");
        assert!(toml::from_str::<AppConfig>(&broken).is_err());
    }

    #[test]
    fn test_resolve_env_missing() {
        assert!(AppConfig::resolve_env("MINTWATCH_DEFINITELY_UNSET_VAR").is_err());
    }
}
