//! Upstream venue integrations.
//!
//! Defines the `VenueApi` capability trait (candidate listing, asset
//! metadata, and quote probes) so the poller and enricher are independent
//! of which aggregator backs them. The production implementation talks to
//! the Jupiter aggregator; tests substitute mocks or stubs.

pub mod jupiter;

use async_trait::async_trait;

use crate::types::PipelineError;

/// Descriptive metadata for an asset, as reported by the aggregator.
#[derive(Debug, Clone)]
pub struct TokenMeta {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// A single swap quote.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    /// Input amount, atomic units.
    pub in_amount: u64,
    /// Output amount, atomic units.
    pub out_amount: u64,
    /// Price impact as a fraction (0.02 = 2%).
    pub price_impact: f64,
}

impl Quote {
    /// Estimate pool depth as the base-asset amount that would move price
    /// by one percent, extrapolated linearly from this probe's impact.
    pub fn depth_at_one_percent(&self, amount_in_base: f64) -> f64 {
        if !self.price_impact.is_finite() || self.price_impact <= 0.0 {
            return 0.0;
        }
        amount_in_base * 0.01 / self.price_impact
    }
}

/// Abstraction over the upstream aggregator.
///
/// Implementors own their retry policy; callers only see the error
/// taxonomy. A 404 on `token_meta` is `Ok(None)`, never an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueApi: Send + Sync {
    /// All currently tradable asset addresses.
    async fn list_tradable(&self) -> Result<Vec<String>, PipelineError>;

    /// Metadata for one asset. `None` when the venue does not know it.
    async fn token_meta(&self, address: &str) -> Result<Option<TokenMeta>, PipelineError>;

    /// Quote swapping `amount` atomic units of `input` into `output`.
    async fn quote(
        &self,
        input: &str,
        output: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<Quote, PipelineError>;

    /// Venue name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_scales_inversely_with_impact() {
        let shallow = Quote {
            in_amount: 1_000_000_000,
            out_amount: 900,
            price_impact: 0.10,
        };
        let deep = Quote {
            price_impact: 0.001,
            ..shallow
        };
        // 1 base unit moving price 10% -> ~0.1 depth at 1%.
        assert!((shallow.depth_at_one_percent(1.0) - 0.1).abs() < 1e-12);
        // Same probe at 0.1% impact -> 10.0 depth.
        assert!((deep.depth_at_one_percent(1.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_zero_on_degenerate_impact() {
        let q = Quote {
            in_amount: 1,
            out_amount: 1,
            price_impact: 0.0,
        };
        assert_eq!(q.depth_at_one_percent(1.0), 0.0);

        let q = Quote {
            price_impact: f64::NAN,
            ..q
        };
        assert_eq!(q.depth_at_one_percent(1.0), 0.0);
    }
}
