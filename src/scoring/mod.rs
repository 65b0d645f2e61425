//! External scoring bridge.
//!
//! A `Scorer` turns a feature vector into a single score in [0, 1] via an
//! external evaluator, reached either by spawning a local process or by
//! HTTP. The `ScoringBridge` wraps a scorer with a per-call deadline,
//! fixed-delay retries, and a deterministic heuristic fallback, so the
//! hybrid strategy can always get a number.

pub mod http;
pub mod process;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::types::{FeatureVector, PipelineError};

/// Serialize the features into the flat map the external evaluators expect.
pub(crate) fn feature_payload(features: &FeatureVector) -> serde_json::Value {
    serde_json::json!({
        "address": features.address,
        "liquidity": features.liquidity,
        "price_impact": features.price_impact,
        "swap_fee": features.swap_fee,
        "tx_rate": features.tx_rate,
        "buy_sell_ratio": features.buy_sell_ratio,
        "holders": features.holders,
        "volatility": features.volatility,
        "creator_score": features.creator_score,
        "ai_score": features.ai_score,
        "predicted_roi_per_sec": features.predicted_roi_per_sec,
        "risk_score": features.risk_score,
        "confidence": features.confidence,
        "time_to_pool": features.time_to_pool,
    })
}

/// One attempt against an external evaluator.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, features: &FeatureVector) -> Result<f64, PipelineError>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Deadline + retry + fallback wrapper around a `Scorer`.
///
/// `score` is infallible: after the configured attempts are exhausted it
/// falls back to `heuristic_score`, which only looks at fields already
/// validated by the enricher.
pub struct ScoringBridge {
    inner: Box<dyn Scorer>,
    attempts: usize,
    retry_delay: Duration,
    deadline: Duration,
}

impl ScoringBridge {
    pub fn new(
        inner: Box<dyn Scorer>,
        attempts: usize,
        retry_delay: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            retry_delay,
            deadline,
        }
    }

    pub async fn score(&self, features: &FeatureVector) -> f64 {
        for attempt in 1..=self.attempts {
            match timeout(self.deadline, self.inner.score(features)).await {
                Ok(Ok(score)) if score.is_finite() => {
                    let score = score.clamp(0.0, 1.0);
                    debug!(
                        scorer = self.inner.name(),
                        address = %features.address,
                        score,
                        attempt,
                        "External score"
                    );
                    return score;
                }
                Ok(Ok(score)) => {
                    warn!(
                        scorer = self.inner.name(),
                        address = %features.address,
                        score,
                        attempt,
                        "Scorer returned a non-finite score"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        scorer = self.inner.name(),
                        address = %features.address,
                        attempt,
                        error = %e,
                        "Scorer attempt failed"
                    );
                }
                Err(_) => {
                    let e = PipelineError::ScoringTimeout(self.deadline.as_millis() as u64);
                    warn!(
                        scorer = self.inner.name(),
                        address = %features.address,
                        attempt,
                        error = %e,
                        "Scorer attempt timed out"
                    );
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        let fallback = heuristic_score(features);
        warn!(
            scorer = self.inner.name(),
            address = %features.address,
            fallback,
            "All scorer attempts failed, using heuristic fallback"
        );
        fallback
    }
}

/// Deterministic stand-in when the external evaluator is unreachable.
/// Rewards depth and buy pressure, punishes impact and risk.
pub fn heuristic_score(features: &FeatureVector) -> f64 {
    let mut score: f64 = 0.0;
    if features.liquidity > 10.0 {
        score += 0.3;
    }
    if features.buy_sell_ratio > 1.5 {
        score += 0.25;
    }
    if features.price_impact < 0.05 {
        score += 0.25;
    }
    if features.risk_score < 0.5 {
        score += 0.2;
    }
    score.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
