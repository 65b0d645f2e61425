//! MINTWATCH binary entry point.
//!
//! Wires the store, venue client, AI oracle, scoring bridge, and strategy
//! engine together, then runs the poller and evaluator until Ctrl-C or a
//! fatal task error.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mintwatch::bus::NotificationBus;
use mintwatch::config::AppConfig;
use mintwatch::engine::{Enricher, Evaluator, Poller};
use mintwatch::license::is_wallet_activated;
use mintwatch::model::ModelClient;
use mintwatch::scoring::{http::HttpScorer, process::ProcessScorer, Scorer, ScoringBridge};
use mintwatch::stats::StatsRecorder;
use mintwatch::store::Store;
use mintwatch::strategy::{manual::builtin_rules, StrategyEngine};
use mintwatch::venue::{jupiter::JupiterClient, VenueApi};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mintwatch=info"));

    if std::env::var("MINTWATCH_LOG_JSON").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_scorer(config: &AppConfig) -> Result<Box<dyn Scorer>> {
    match config.scoring.transport.as_str() {
        "process" => {
            let input_path = config
                .scoring
                .input_path
                .as_deref()
                .context("scoring.input_path required for the process transport")?;
            let executable = config
                .scoring
                .executable
                .as_deref()
                .context("scoring.executable required for the process transport")?;
            Ok(Box::new(ProcessScorer::new(input_path, executable)))
        }
        "http" => {
            let url = config
                .scoring
                .url
                .as_deref()
                .context("scoring.url required for the http transport")?;
            Ok(Box::new(HttpScorer::new(url)?))
        }
        other => bail!("unknown scoring transport: {other}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = AppConfig::load(&config_path)?;

    info!(
        agent = %config.agent.name,
        live_mode = config.agent.live_mode,
        config = %config_path,
        "MINTWATCH starting"
    );

    // Live trading is gated on wallet activation; simulation never is.
    if config.agent.live_mode {
        let pubkey = AppConfig::resolve_env(&config.license.wallet_pubkey_env)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        if !is_wallet_activated(&http, &config.license.backend_url, &pubkey).await? {
            bail!("wallet {pubkey} is not activated, refusing to start in live mode");
        }
        info!("Wallet activation confirmed");
    }

    let store = Arc::new(
        Store::open(&config.store.path, config.store.connect_attempts)
            .await
            .context("failed to open the store")?,
    );

    let venue: Arc<dyn VenueApi> = Arc::new(JupiterClient::new(
        &config.venue.token_api_base,
        &config.venue.quote_api_base,
        config.venue.retry_attempts,
        Duration::from_millis(config.venue.retry_initial_delay_ms),
    )?);

    let model = Arc::new(ModelClient::new(
        &config.model.url,
        Duration::from_secs(config.model.timeout_secs),
    )?);

    let bridge = Arc::new(ScoringBridge::new(
        build_scorer(&config)?,
        config.scoring.attempts,
        Duration::from_millis(config.scoring.retry_delay_ms),
        Duration::from_secs(config.scoring.timeout_secs),
    ));

    let engine = StrategyEngine::new(builtin_rules(bridge, config.scoring.hybrid_threshold));
    info!(rules = engine.len(), "Strategy engine ready");

    let bus = NotificationBus::new();
    let stats = StatsRecorder::new(store.clone());

    let poller = Poller::new(
        venue.clone(),
        store.clone(),
        bus.clone(),
        config.venue.base_mint.clone(),
        config.venue.probe_amount,
        config.venue.slippage_bps,
        Duration::from_secs(config.agent.scan_interval_secs),
        config.agent.min_liquidity,
        config.agent.batch_size,
        Duration::from_millis(config.agent.item_delay_ms),
    );

    let enricher = Enricher::new(
        venue,
        model,
        config.venue.base_mint.clone(),
        config.venue.deep_probe_amount,
        config.venue.slippage_bps,
        Duration::from_secs(config.model.timeout_secs),
    );
    let evaluator = Evaluator::new(
        store.clone(),
        enricher,
        engine,
        bus.clone(),
        config.agent.live_mode,
    );

    let poller_handle = tokio::spawn(async move { poller.run().await });
    let evaluator_handle = tokio::spawn(async move { evaluator.run().await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = poller_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "Poller task failed"),
                Err(e) => error!(error = %e, "Poller task panicked"),
                Ok(Ok(())) => {}
            }
        }
        result = evaluator_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "Evaluator task failed"),
                Err(e) => error!(error = %e, "Evaluator task panicked"),
                Ok(Ok(())) => {}
            }
        }
    }

    if let Err(e) = stats.log_report().await {
        warn!(error = %e, "Could not produce the shutdown report");
    }
    info!("MINTWATCH stopped");
    Ok(())
}
