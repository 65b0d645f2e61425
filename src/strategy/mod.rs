//! Strategy evaluation.
//!
//! A strategy is a named async predicate over a `FeatureVector`. The
//! engine holds an ordered list and returns the first one that matches;
//! order is therefore part of the configuration, and a predicate error
//! counts as "no match" so one broken rule cannot veto the rest.

pub mod manual;

use async_trait::async_trait;
use tracing::warn;

use crate::types::FeatureVector;

#[async_trait]
pub trait StrategyRule: Send + Sync {
    /// Stable identifier used as the stats key.
    fn id(&self) -> &str;

    /// Human-readable description for logs.
    fn label(&self) -> &str;

    /// Relative sizing weight for a matched asset.
    fn weight(&self) -> f64;

    async fn matches(&self, features: &FeatureVector) -> anyhow::Result<bool>;
}

// ---------------------------------------------------------------------------
// Simple predicate rules
// ---------------------------------------------------------------------------

/// A rule backed by a plain synchronous predicate.
pub struct ManualRule {
    id: &'static str,
    label: &'static str,
    weight: f64,
    predicate: fn(&FeatureVector) -> bool,
}

impl ManualRule {
    pub fn new(
        id: &'static str,
        label: &'static str,
        weight: f64,
        predicate: fn(&FeatureVector) -> bool,
    ) -> Self {
        Self {
            id,
            label,
            weight,
            predicate,
        }
    }
}

#[async_trait]
impl StrategyRule for ManualRule {
    fn id(&self) -> &str {
        self.id
    }

    fn label(&self) -> &str {
        self.label
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn matches(&self, features: &FeatureVector) -> anyhow::Result<bool> {
        Ok((self.predicate)(features))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct StrategyEngine {
    rules: Vec<Box<dyn StrategyRule>>,
}

impl StrategyEngine {
    pub fn new(rules: Vec<Box<dyn StrategyRule>>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First-match evaluation in registration order.
    pub async fn evaluate(&self, features: &FeatureVector) -> Option<&dyn StrategyRule> {
        for rule in &self.rules {
            match rule.matches(features).await {
                Ok(true) => return Some(rule.as_ref()),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        strategy = rule.id(),
                        address = %features.address,
                        error = %e,
                        "Strategy predicate failed, treating as no match"
                    );
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct ErrorRule;

    #[async_trait]
    impl StrategyRule for ErrorRule {
        fn id(&self) -> &str {
            "broken"
        }
        fn label(&self) -> &str {
            "always errors"
        }
        fn weight(&self) -> f64 {
            1.0
        }
        async fn matches(&self, _features: &FeatureVector) -> anyhow::Result<bool> {
            anyhow::bail!("predicate exploded")
        }
    }

    fn always(_: &FeatureVector) -> bool {
        true
    }
    fn never(_: &FeatureVector) -> bool {
        false
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let engine = StrategyEngine::new(vec![
            Box::new(ManualRule::new("a", "never matches", 1.0, never)),
            Box::new(ManualRule::new("b", "always matches", 1.0, always)),
            Box::new(ManualRule::new("c", "also matches", 1.0, always)),
        ]);
        let hit = engine.evaluate(&FeatureVector::sample("mint1")).await;
        assert_eq!(hit.unwrap().id(), "b");
    }

    #[tokio::test]
    async fn test_no_rules_match() {
        let engine = StrategyEngine::new(vec![Box::new(ManualRule::new(
            "a",
            "never matches",
            1.0,
            never,
        ))]);
        assert!(engine
            .evaluate(&FeatureVector::sample("mint1"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_predicate_error_is_no_match() {
        let engine = StrategyEngine::new(vec![
            Box::new(ErrorRule),
            Box::new(ManualRule::new("b", "always matches", 1.0, always)),
        ]);
        // The broken rule is skipped, evaluation continues.
        let hit = engine.evaluate(&FeatureVector::sample("mint1")).await;
        assert_eq!(hit.unwrap().id(), "b");
    }

    #[tokio::test]
    async fn test_all_rules_error_yields_none() {
        let engine = StrategyEngine::new(vec![Box::new(ErrorRule), Box::new(ErrorRule)]);
        assert!(engine
            .evaluate(&FeatureVector::sample("mint1"))
            .await
            .is_none());
    }
}
