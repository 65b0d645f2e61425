//! Built-in rule catalog.
//!
//! Threshold and combination rules over the feature vector, evaluated in
//! the order listed here, plus the hybrid rule that defers to the external
//! scoring bridge. The hybrid rule carries a higher sizing weight because
//! its matches are rarer and better qualified.

use async_trait::async_trait;
use std::sync::Arc;

use super::{ManualRule, StrategyRule};
use crate::scoring::ScoringBridge;
use crate::types::FeatureVector;

/// Weight applied to every plain threshold rule.
const BASE_WEIGHT: f64 = 1.0;

/// Weight of the score-driven hybrid rule.
const HYBRID_WEIGHT: f64 = 1.5;

// ---------------------------------------------------------------------------
// Hybrid rule
// ---------------------------------------------------------------------------

/// Matches when the external evaluator's score clears the threshold.
pub struct HybridRule {
    bridge: Arc<ScoringBridge>,
    threshold: f64,
}

impl HybridRule {
    pub fn new(bridge: Arc<ScoringBridge>, threshold: f64) -> Self {
        Self { bridge, threshold }
    }
}

#[async_trait]
impl StrategyRule for HybridRule {
    fn id(&self) -> &str {
        "hybrid_score"
    }

    fn label(&self) -> &str {
        "external evaluator score above threshold"
    }

    fn weight(&self) -> f64 {
        HYBRID_WEIGHT
    }

    async fn matches(&self, features: &FeatureVector) -> anyhow::Result<bool> {
        Ok(self.bridge.score(features).await > self.threshold)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The full rule set in evaluation order. Combination rules come first so
/// they are not shadowed by the single-threshold rules they strengthen.
pub fn builtin_rules(
    bridge: Arc<ScoringBridge>,
    hybrid_threshold: f64,
) -> Vec<Box<dyn StrategyRule>> {
    vec![
        Box::new(ManualRule::new(
            "snipe_combo_1",
            "deep pool, strong buy pressure, fresh launch",
            BASE_WEIGHT,
            |f| f.liquidity > 10.0 && f.buy_sell_ratio > 2.0 && f.time_to_pool < 60.0,
        )),
        Box::new(ManualRule::new(
            "moon_combo",
            "AI conviction with low risk and real depth",
            BASE_WEIGHT,
            |f| f.ai_score > 0.7 && f.risk_score < 0.3 && f.liquidity > 5.0,
        )),
        Box::new(ManualRule::new(
            "early_whale",
            "very fresh pool already deep",
            BASE_WEIGHT,
            |f| f.time_to_pool < 30.0 && f.liquidity > 20.0,
        )),
        Box::new(ManualRule::new(
            "trusted_creator_combo",
            "trusted creator with calm price action",
            BASE_WEIGHT,
            |f| f.creator_score > 0.8 && f.volatility < 0.3,
        )),
        Box::new(ManualRule::new(
            "confident_ai_combo",
            "confident oracle predicting positive ROI",
            BASE_WEIGHT,
            |f| f.confidence > 0.6 && f.predicted_roi_per_sec > 0.0,
        )),
        Box::new(ManualRule::new(
            "tight_spread_combo",
            "low impact and balanced flow",
            BASE_WEIGHT,
            |f| f.price_impact < 0.02 && f.buy_sell_ratio > 0.8 && f.buy_sell_ratio < 1.25,
        )),
        Box::new(ManualRule::new(
            "liq_gt_10",
            "liquidity above 10 base units",
            BASE_WEIGHT,
            |f| f.liquidity > 10.0,
        )),
        Box::new(ManualRule::new(
            "liq_gt_50",
            "liquidity above 50 base units",
            BASE_WEIGHT,
            |f| f.liquidity > 50.0,
        )),
        Box::new(ManualRule::new(
            "holders_lt_20",
            "fewer than 20 holders",
            BASE_WEIGHT,
            |f| f.holders < 20,
        )),
        Box::new(ManualRule::new(
            "holders_gt_100",
            "more than 100 holders",
            BASE_WEIGHT,
            |f| f.holders > 100,
        )),
        Box::new(ManualRule::new(
            "buy_sell_gt_2",
            "buy pressure at least twice sell pressure",
            BASE_WEIGHT,
            |f| f.buy_sell_ratio > 2.0,
        )),
        Box::new(ManualRule::new(
            "buy_sell_gt_5",
            "buy pressure five times sell pressure",
            BASE_WEIGHT,
            |f| f.buy_sell_ratio > 5.0,
        )),
        Box::new(ManualRule::new(
            "volatility_lt_02",
            "volatility below 0.2",
            BASE_WEIGHT,
            |f| f.volatility < 0.2,
        )),
        Box::new(ManualRule::new(
            "impact_lt_5pct",
            "deep probe impact below 5%",
            BASE_WEIGHT,
            |f| f.price_impact < 0.05,
        )),
        Box::new(ManualRule::new(
            "time_to_pool_lt_30",
            "enriched within 30 seconds of detection",
            BASE_WEIGHT,
            |f| f.time_to_pool < 30.0,
        )),
        Box::new(ManualRule::new(
            "low_fee",
            "swap fee at most 0.3%",
            BASE_WEIGHT,
            |f| f.swap_fee <= 0.3,
        )),
        Box::new(ManualRule::new(
            "active_pool",
            "transaction rate above 5 per second",
            BASE_WEIGHT,
            |f| f.tx_rate > 5.0,
        )),
        Box::new(ManualRule::new(
            "ai_score_gt_07",
            "oracle score above 0.7",
            BASE_WEIGHT,
            |f| f.ai_score > 0.7,
        )),
        Box::new(ManualRule::new(
            "low_risk",
            "risk score below 0.2",
            BASE_WEIGHT,
            |f| f.risk_score < 0.2,
        )),
        Box::new(ManualRule::new(
            "creator_score_gt_09",
            "creator trust above 0.9",
            BASE_WEIGHT,
            |f| f.creator_score > 0.9,
        )),
        Box::new(HybridRule::new(bridge, hybrid_threshold)),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Scorer;
    use crate::types::PipelineError;
    use std::collections::HashSet;
    use std::time::Duration;

    struct FixedScorer(f64);

    #[async_trait]
    impl Scorer for FixedScorer {
        async fn score(&self, _features: &FeatureVector) -> Result<f64, PipelineError> {
            Ok(self.0)
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn catalog(score: f64) -> Vec<Box<dyn StrategyRule>> {
        let bridge = Arc::new(ScoringBridge::new(
            Box::new(FixedScorer(score)),
            1,
            Duration::from_millis(1),
            Duration::from_millis(100),
        ));
        builtin_rules(bridge, 0.75)
    }

    #[test]
    fn test_catalog_has_unique_ids() {
        let rules = catalog(0.0);
        let ids: HashSet<&str> = rules.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), rules.len());
        assert!(rules.len() >= 21);
    }

    #[test]
    fn test_hybrid_is_last_and_heavier() {
        let rules = catalog(0.0);
        let last = rules.last().unwrap();
        assert_eq!(last.id(), "hybrid_score");
        assert_eq!(last.weight(), 1.5);
        assert!(rules[..rules.len() - 1].iter().all(|r| r.weight() == 1.0));
    }

    #[tokio::test]
    async fn test_hybrid_matches_above_threshold() {
        let rules = catalog(0.8);
        let hybrid = rules.last().unwrap();
        let mut f = FeatureVector::sample("mint1");
        assert!(hybrid.matches(&f).await.unwrap());

        // At exactly the threshold it must not match.
        let rules = catalog(0.75);
        assert!(!rules.last().unwrap().matches(&f).await.unwrap());

        f.address = "mint2".to_string();
        let rules = catalog(0.2);
        assert!(!rules.last().unwrap().matches(&f).await.unwrap());
    }

    #[tokio::test]
    async fn test_liq_rule_threshold() {
        let rules = catalog(0.0);
        let liq = rules.iter().find(|r| r.id() == "liq_gt_10").unwrap();
        let mut f = FeatureVector::sample("mint1");
        f.liquidity = 10.5;
        assert!(liq.matches(&f).await.unwrap());
        f.liquidity = 10.0;
        assert!(!liq.matches(&f).await.unwrap());
    }

    #[tokio::test]
    async fn test_snipe_combo_requires_all_legs() {
        let rules = catalog(0.0);
        let combo = rules.iter().find(|r| r.id() == "snipe_combo_1").unwrap();
        let mut f = FeatureVector::sample("mint1");
        f.liquidity = 15.0;
        f.buy_sell_ratio = 3.0;
        f.time_to_pool = 20.0;
        assert!(combo.matches(&f).await.unwrap());

        f.time_to_pool = 120.0;
        assert!(!combo.matches(&f).await.unwrap());
    }
}
