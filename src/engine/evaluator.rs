//! Evaluation loop.
//!
//! Subscribes to the notification bus, claims each announced asset via
//! the durable processed marker, enriches it, and runs the strategy
//! engine. On a match the strategy's counter is updated and either a
//! simulated position is logged or, in live mode, the hand-off is logged
//! for the execution layer. At startup the most recent stored assets are
//! re-examined so announcements published while the process was down are
//! not lost.

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::Enricher;
use crate::bus::NotificationBus;
use crate::store::Store;
use crate::strategy::StrategyEngine;
use crate::types::PipelineError;

/// How many recent assets to re-examine at startup.
const STARTUP_DRAIN: usize = 10;

/// What happened to one announced asset.
#[derive(Debug, PartialEq, Eq)]
pub enum EvalOutcome {
    /// Another delivery already claimed the processed marker.
    Duplicate,
    /// The token record was missing from the store.
    NotFound,
    Evaluated { matched: Option<String> },
}

pub struct Evaluator {
    store: Arc<Store>,
    enricher: Enricher,
    engine: StrategyEngine,
    bus: NotificationBus,
    live_mode: bool,
}

impl Evaluator {
    pub fn new(
        store: Arc<Store>,
        enricher: Enricher,
        engine: StrategyEngine,
        bus: NotificationBus,
        live_mode: bool,
    ) -> Self {
        Self {
            store,
            enricher,
            engine,
            bus,
            live_mode,
        }
    }

    /// Consume announcements until the bus closes. Subscribes before the
    /// startup drain so nothing published in between is missed.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut rx = self.bus.subscribe();
        info!(
            rules = self.engine.len(),
            live_mode = self.live_mode,
            "Evaluator started"
        );

        for address in self
            .store
            .list_recent(STARTUP_DRAIN)
            .await
            .context("startup drain failed")?
        {
            self.handle_with_policy(&address).await?;
        }

        loop {
            match rx.recv().await {
                Ok(address) => {
                    self.handle_with_policy(&address).await?;
                }
                Err(RecvError::Lagged(missed)) => {
                    // Dropped announcements are recovered by the next
                    // startup drain; the processed marker keeps this safe.
                    warn!(missed, "Evaluator lagged behind the bus");
                }
                Err(RecvError::Closed) => {
                    info!("Notification bus closed, evaluator stopping");
                    return Ok(());
                }
            }
        }
    }

    /// Apply the error policy around `handle_token`: store failures are
    /// fatal, everything else is logged and skipped.
    async fn handle_with_policy(&self, address: &str) -> anyhow::Result<()> {
        match self.handle_token(address).await {
            Ok(_) => Ok(()),
            Err(e @ PipelineError::Store(_)) => {
                error!(address, error = %e, "Store failure during evaluation");
                Err(e.into())
            }
            Err(e) => {
                warn!(address, error = %e, "Evaluation failed, skipping asset");
                Ok(())
            }
        }
    }

    /// Evaluate one announced asset exactly once.
    pub async fn handle_token(&self, address: &str) -> Result<EvalOutcome, PipelineError> {
        // Claiming the marker first makes duplicate deliveries harmless,
        // at the cost of never retrying an asset whose evaluation failed.
        if !self.store.mark_processed(address).await? {
            return Ok(EvalOutcome::Duplicate);
        }

        let features = match self.enricher.enrich(&self.store, address).await {
            Ok(features) => features,
            Err(PipelineError::NotFound(_)) => {
                warn!(address, "Announced asset has no stored record");
                return Ok(EvalOutcome::NotFound);
            }
            Err(e) => return Err(e),
        };

        debug!(
            address,
            liquidity = features.liquidity,
            buy_sell_ratio = features.buy_sell_ratio,
            ai_score = features.ai_score,
            "Features computed"
        );

        match self.engine.evaluate(&features).await {
            Some(rule) => {
                self.store.record_match(rule.id(), address).await?;
                if self.live_mode {
                    info!(
                        address,
                        strategy = rule.id(),
                        weight = rule.weight(),
                        "LIVE match, handing off to execution"
                    );
                } else {
                    let position_id = Uuid::new_v4();
                    info!(
                        address,
                        strategy = rule.id(),
                        weight = rule.weight(),
                        %position_id,
                        "Simulated position opened"
                    );
                }
                Ok(EvalOutcome::Evaluated {
                    matched: Some(rule.id().to_string()),
                })
            }
            None => {
                debug!(address, "No strategy matched");
                Ok(EvalOutcome::Evaluated { matched: None })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelClient;
    use crate::strategy::ManualRule;
    use crate::types::{FeatureVector, TokenRecord};
    use crate::venue::{MockVenueApi, Quote};
    use std::time::Duration;

    async fn temp_store() -> Arc<Store> {
        let mut path = std::env::temp_dir();
        path.push(format!("mintwatch_eval_{}.db", uuid::Uuid::new_v4()));
        Arc::new(Store::open(path.to_str().unwrap(), 1).await.unwrap())
    }

    fn quoting_venue() -> MockVenueApi {
        let mut venue = MockVenueApi::new();
        venue.expect_quote().returning(|input, _, _, _| {
            if input == "BaseMint111" {
                Ok(Quote {
                    in_amount: 1_000_000_000,
                    out_amount: 5_000_000,
                    price_impact: 0.0005,
                })
            } else {
                Ok(Quote {
                    in_amount: 5_000_000,
                    out_amount: 990_000_000,
                    price_impact: 0.001,
                })
            }
        });
        venue
    }

    fn evaluator(
        store: Arc<Store>,
        venue: MockVenueApi,
        rules: Vec<Box<dyn crate::strategy::StrategyRule>>,
    ) -> Evaluator {
        let model = Arc::new(
            ModelClient::new("http://127.0.0.1:9", Duration::from_millis(300)).unwrap(),
        );
        let enricher = Enricher::new(
            Arc::new(venue),
            model,
            "BaseMint111".to_string(),
            1_000_000_000,
            1000,
            Duration::from_secs(2),
        );
        Evaluator::new(
            store,
            enricher,
            StrategyEngine::new(rules),
            NotificationBus::new(),
            false,
        )
    }

    fn always(_: &FeatureVector) -> bool {
        true
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_claimed_once() {
        let store = temp_store().await;
        store
            .put_token(&TokenRecord::sample("mintA"))
            .await
            .unwrap();

        let eval = evaluator(
            store.clone(),
            quoting_venue(),
            vec![Box::new(ManualRule::new("take_all", "matches all", 1.0, always))],
        );

        let first = eval.handle_token("mintA").await.unwrap();
        assert_eq!(
            first,
            EvalOutcome::Evaluated {
                matched: Some("take_all".to_string())
            }
        );
        let second = eval.handle_token("mintA").await.unwrap();
        assert_eq!(second, EvalOutcome::Duplicate);

        // Exactly one match recorded despite two deliveries.
        let (count, last) = store.match_info("take_all").await.unwrap().unwrap();
        assert_eq!(count, 1);
        assert_eq!(last.as_deref(), Some("mintA"));
    }

    #[tokio::test]
    async fn test_unknown_address_is_not_found() {
        let store = temp_store().await;
        let eval = evaluator(store, quoting_venue(), vec![]);
        assert_eq!(
            eval.handle_token("ghost").await.unwrap(),
            EvalOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_no_match_records_nothing() {
        let store = temp_store().await;
        store
            .put_token(&TokenRecord::sample("mintA"))
            .await
            .unwrap();

        let eval = evaluator(
            store.clone(),
            quoting_venue(),
            vec![Box::new(ManualRule::new(
                "impossible",
                "never matches",
                1.0,
                |f| f.liquidity > 1e12,
            ))],
        );

        assert_eq!(
            eval.handle_token("mintA").await.unwrap(),
            EvalOutcome::Evaluated { matched: None }
        );
        assert!(store.match_info("impossible").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_matching_rule_is_recorded() {
        let store = temp_store().await;
        store
            .put_token(&TokenRecord::sample("mintA"))
            .await
            .unwrap();

        let eval = evaluator(
            store.clone(),
            quoting_venue(),
            vec![
                Box::new(ManualRule::new("second", "also matches", 1.0, always)),
                Box::new(ManualRule::new("third", "matches too", 1.0, always)),
            ],
        );

        let outcome = eval.handle_token("mintA").await.unwrap();
        assert_eq!(
            outcome,
            EvalOutcome::Evaluated {
                matched: Some("second".to_string())
            }
        );
        assert!(store.match_info("second").await.unwrap().is_some());
        assert!(store.match_info("third").await.unwrap().is_none());
    }
}
