//! Shared types for the MINTWATCH agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that venue, scoring, strategy,
//! and engine modules can depend on them without circular references.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Validation bounds and defaults
// ---------------------------------------------------------------------------

/// Floor applied to any liquidity estimate (base-asset units).
pub const LIQUIDITY_FLOOR: f64 = 0.01;

/// Price impact assumed when a quote probe fails or returns garbage.
pub const DEFAULT_IMPACT: f64 = 0.05;

/// Buy/sell ratio clamp bounds.
pub const BUY_SELL_MIN: f64 = 0.1;
pub const BUY_SELL_MAX: f64 = 20.0;

/// Neutral defaults used when the AI scoring oracle is unreachable or slow.
pub const DEFAULT_AI_SCORE: f64 = 0.5;
pub const DEFAULT_RISK_SCORE: f64 = 0.5;
pub const DEFAULT_HOLDERS: u32 = 50;
pub const DEFAULT_CONFIDENCE: f64 = 0.3;

// ---------------------------------------------------------------------------
// Token record
// ---------------------------------------------------------------------------

/// A tradable asset as first observed by the poller.
///
/// Keyed by the venue-assigned mint address. Immutable once stored;
/// presence of the key in the store means the asset has been seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Venue-assigned mint address (unique identity).
    pub address: String,
    pub symbol: String,
    /// Liquidity figure at detection time, in base-asset units.
    pub liquidity: f64,
    /// Daily volume as reported by the aggregator (0 when unknown).
    pub volume: f64,
    /// Swap fee in percent.
    pub swap_fee: f64,
    /// Transaction rate as reported (0 when unknown).
    pub tx_rate: f64,
    /// Price impact of the detection-time probe.
    pub impact: f64,
    /// First-detected timestamp, epoch milliseconds.
    pub detected_at: i64,
}

impl fmt::Display for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) liq={:.3} impact={:.3}",
            self.symbol, self.address, self.liquidity, self.impact
        )
    }
}

impl TokenRecord {
    /// Helper to build a test record with sensible defaults.
    #[cfg(test)]
    pub fn sample(address: &str) -> Self {
        TokenRecord {
            address: address.to_string(),
            symbol: address.chars().take(6).collect(),
            liquidity: 12.0,
            volume: 300.0,
            swap_fee: 0.25,
            tx_rate: 4.0,
            impact: 0.02,
            detected_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// ---------------------------------------------------------------------------
// Feature vector
// ---------------------------------------------------------------------------

/// Complete per-asset feature set handed to the strategy engine.
///
/// Computed fresh on every enrichment pass and always produced whole:
/// `validate()` guarantees every numeric field is finite and in range, so
/// a failed upstream call can never leak an invalid number downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub address: String,
    pub symbol: String,
    /// Estimated depth in base-asset units.
    pub liquidity: f64,
    /// Price impact fraction of the deep probe.
    pub price_impact: f64,
    /// Swap fee in percent.
    pub swap_fee: f64,
    pub tx_rate: f64,
    /// Buy pressure vs sell pressure, clamped to [0.1, 20].
    pub buy_sell_ratio: f64,
    pub holders: u32,
    /// Short-horizon volatility estimate, [0, 1].
    pub volatility: f64,
    /// Creator trust score, [0, 1].
    pub creator_score: f64,
    /// AI oracle score, [0, 1].
    pub ai_score: f64,
    /// AI-predicted ROI per second (may be negative).
    pub predicted_roi_per_sec: f64,
    /// Risk score, [0, 1]. Higher is riskier.
    pub risk_score: f64,
    /// Oracle confidence in its own outputs, [0, 1].
    pub confidence: f64,
    /// Seconds elapsed between detection and enrichment.
    pub time_to_pool: f64,
}

impl FeatureVector {
    /// Replace non-finite values with documented defaults and clamp every
    /// field to its valid range. Called once before a vector leaves the
    /// enricher; strategy predicates may assume the invariants hold.
    pub fn validate(mut self) -> Self {
        self.liquidity = finite_or(self.liquidity, LIQUIDITY_FLOOR).max(LIQUIDITY_FLOOR);
        self.price_impact = finite_or(self.price_impact, DEFAULT_IMPACT).clamp(0.0, 1.0);
        self.swap_fee = finite_or(self.swap_fee, 0.0).max(0.0);
        self.tx_rate = finite_or(self.tx_rate, 0.0).max(0.0);
        self.buy_sell_ratio =
            finite_or(self.buy_sell_ratio, 1.0).clamp(BUY_SELL_MIN, BUY_SELL_MAX);
        self.volatility = finite_or(self.volatility, 0.0).clamp(0.0, 1.0);
        self.creator_score = finite_or(self.creator_score, 0.0).clamp(0.0, 1.0);
        self.ai_score = finite_or(self.ai_score, DEFAULT_AI_SCORE).clamp(0.0, 1.0);
        self.predicted_roi_per_sec = finite_or(self.predicted_roi_per_sec, 0.0);
        self.risk_score = finite_or(self.risk_score, DEFAULT_RISK_SCORE).clamp(0.0, 1.0);
        self.confidence = finite_or(self.confidence, DEFAULT_CONFIDENCE).clamp(0.0, 1.0);
        self.time_to_pool = finite_or(self.time_to_pool, 0.0).max(0.0);
        self
    }

    /// Helper to build a test vector that passes validation untouched.
    #[cfg(test)]
    pub fn sample(address: &str) -> Self {
        FeatureVector {
            address: address.to_string(),
            symbol: address.chars().take(6).collect(),
            liquidity: 12.0,
            price_impact: 0.02,
            swap_fee: 0.25,
            tx_rate: 4.0,
            buy_sell_ratio: 1.5,
            holders: 50,
            volatility: 0.2,
            creator_score: 0.85,
            ai_score: 0.8,
            predicted_roi_per_sec: 0.001,
            risk_score: 0.3,
            confidence: 0.7,
            time_to_pool: 45.0,
        }
    }
}

fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

// ---------------------------------------------------------------------------
// Strategy performance
// ---------------------------------------------------------------------------

/// Cumulative per-strategy counters. Counters only accumulate; records are
/// never deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub roi_sum: f64,
    pub roi_sec_sum: f64,
    pub trades: u64,
    pub wins: u64,
    /// Sum of negative ROIs (always <= 0).
    pub drawdowns: f64,
}

/// Derived averages for reporting. Zero trades yields zero averages.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub id: String,
    pub roi_avg: f64,
    pub roi_sec_avg: f64,
    pub win_rate: f64,
    pub drawdowns: f64,
}

impl PerformanceReport {
    pub fn from_counters(id: &str, perf: &StrategyPerformance) -> Self {
        let trades = perf.trades as f64;
        let (roi_avg, roi_sec_avg, win_rate) = if perf.trades == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                perf.roi_sum / trades,
                perf.roi_sec_sum / trades,
                perf.wins as f64 / trades,
            )
        };
        PerformanceReport {
            id: id.to_string(),
            roi_avg,
            roi_sec_avg,
            win_rate,
            drawdowns: perf.drawdowns,
        }
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Failure classes the pipeline distinguishes.
///
/// Only `Store` escalates past a single asset; everything else degrades to
/// defaults or skips the asset at the stage where it occurred.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network or HTTP failure talking to the upstream aggregator.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Response arrived but could not be parsed into the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Asset record missing when enrichment was attempted.
    #[error("token record not found: {0}")]
    NotFound(String),

    /// External scorer exceeded its deadline.
    #[error("scoring timed out after {0} ms")]
    ScoringTimeout(u64),

    /// Scorer process/HTTP call failed.
    #[error("scoring unavailable: {0}")]
    ScoringUnavailable(String),

    /// Persistence failure, escalated to the caller.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
