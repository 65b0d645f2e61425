//! Feature enrichment.
//!
//! Builds the full `FeatureVector` for one recorded asset: a deep quote
//! probe for liquidity and impact, an opposite-direction probe for the
//! buy/sell pressure ratio, and an AI oracle call for the predicted
//! fields. Every upstream failure degrades to a documented default; only
//! a missing token record or a store failure escapes as an error.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::BASE_UNIT;
use crate::model::{AiPrediction, ModelClient};
use crate::store::Store;
use crate::types::{
    FeatureVector, PipelineError, TokenRecord, BUY_SELL_MAX, BUY_SELL_MIN, DEFAULT_HOLDERS,
    DEFAULT_IMPACT, LIQUIDITY_FLOOR,
};
use crate::venue::VenueApi;

/// Baseline volatility until a price-history feed exists.
const VOLATILITY_BASELINE: f64 = 0.2;

/// Baseline creator trust until on-chain creator analysis exists.
const CREATOR_SCORE_BASELINE: f64 = 0.85;

/// Keeps the pressure ratio defined when an impact is zero.
const RATIO_EPSILON: f64 = 1e-6;

pub struct Enricher {
    venue: Arc<dyn VenueApi>,
    model: Arc<ModelClient>,
    base_mint: String,
    deep_probe_amount: u64,
    slippage_bps: u32,
    item_timeout: Duration,
}

impl Enricher {
    pub fn new(
        venue: Arc<dyn VenueApi>,
        model: Arc<ModelClient>,
        base_mint: String,
        deep_probe_amount: u64,
        slippage_bps: u32,
        item_timeout: Duration,
    ) -> Self {
        Self {
            venue,
            model,
            base_mint,
            deep_probe_amount,
            slippage_bps,
            item_timeout,
        }
    }

    /// Compute the feature vector for a recorded asset. The vector is
    /// always complete and validated; individual probe failures show up
    /// as default values, not errors.
    pub async fn enrich(
        &self,
        store: &Store,
        address: &str,
    ) -> Result<FeatureVector, PipelineError> {
        let record = store
            .get_token(address)
            .await?
            .ok_or_else(|| PipelineError::NotFound(address.to_string()))?;

        let (liquidity, impact, buy_sell_ratio) = self.probe_pressure(address, &record).await;

        let elapsed_secs =
            ((Utc::now().timestamp_millis() - record.detected_at) as f64 / 1000.0).max(0.0);

        let prediction = self
            .model
            .predict([
                elapsed_secs,
                DEFAULT_HOLDERS as f64,
                VOLATILITY_BASELINE,
                CREATOR_SCORE_BASELINE,
            ])
            .await;

        Ok(self.assemble(record, liquidity, impact, buy_sell_ratio, elapsed_secs, prediction))
    }

    /// Deep buy probe plus a sell probe of the quoted output, bounded by
    /// the per-item timeout. Returns (liquidity, impact, buy/sell ratio).
    async fn probe_pressure(&self, address: &str, record: &TokenRecord) -> (f64, f64, f64) {
        let buy = tokio::time::timeout(
            self.item_timeout,
            self.venue.quote(
                &self.base_mint,
                address,
                self.deep_probe_amount,
                self.slippage_bps,
            ),
        )
        .await;

        let buy = match buy {
            Ok(Ok(quote)) => Some(quote),
            Ok(Err(e)) => {
                warn!(address, error = %e, "Deep buy probe failed");
                None
            }
            Err(_) => {
                warn!(address, "Deep buy probe timed out");
                None
            }
        };

        let (liquidity, impact) = match &buy {
            Some(quote) => (
                quote
                    .depth_at_one_percent(self.deep_probe_amount as f64 / BASE_UNIT)
                    .max(LIQUIDITY_FLOOR),
                quote.price_impact,
            ),
            // Fall back to what the poller saw at detection time.
            None => (record.liquidity.max(LIQUIDITY_FLOOR), DEFAULT_IMPACT),
        };

        let sell = match &buy {
            Some(quote) if quote.out_amount > 0 => {
                match tokio::time::timeout(
                    self.item_timeout,
                    self.venue.quote(
                        address,
                        &self.base_mint,
                        quote.out_amount,
                        self.slippage_bps,
                    ),
                )
                .await
                {
                    Ok(Ok(sell_quote)) => Some(sell_quote),
                    Ok(Err(e)) => {
                        warn!(address, error = %e, "Sell probe failed");
                        None
                    }
                    Err(_) => {
                        warn!(address, "Sell probe timed out");
                        None
                    }
                }
            }
            _ => None,
        };

        // Easier exits than entries read as buy pressure. A one-sided
        // failure skews hard in the direction the market is signalling.
        let ratio = match (&buy, &sell) {
            (Some(b), Some(s)) => {
                ((s.price_impact.max(0.0) + RATIO_EPSILON)
                    / (b.price_impact.max(0.0) + RATIO_EPSILON))
                    .clamp(BUY_SELL_MIN, BUY_SELL_MAX)
            }
            (Some(_), None) => BUY_SELL_MAX / 2.0,
            (None, _) => 1.0,
        };

        debug!(
            address,
            liquidity, impact, ratio, "Pressure probes complete"
        );
        (liquidity, impact, ratio)
    }

    fn assemble(
        &self,
        record: TokenRecord,
        liquidity: f64,
        impact: f64,
        buy_sell_ratio: f64,
        elapsed_secs: f64,
        prediction: AiPrediction,
    ) -> FeatureVector {
        FeatureVector {
            address: record.address,
            symbol: record.symbol,
            liquidity,
            price_impact: impact,
            swap_fee: record.swap_fee,
            tx_rate: record.tx_rate,
            buy_sell_ratio,
            holders: prediction.holders,
            volatility: VOLATILITY_BASELINE,
            creator_score: CREATOR_SCORE_BASELINE,
            ai_score: prediction.ai_score,
            predicted_roi_per_sec: prediction.predicted_roi_per_sec,
            risk_score: prediction.risk_score,
            confidence: prediction.confidence,
            time_to_pool: elapsed_secs,
        }
        .validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::{MockVenueApi, Quote};

    async fn temp_store() -> Store {
        let mut path = std::env::temp_dir();
        path.push(format!("mintwatch_enrich_{}.db", uuid::Uuid::new_v4()));
        Store::open(path.to_str().unwrap(), 1).await.unwrap()
    }

    /// Oracle at an unreachable address so every prediction falls back to
    /// the neutral defaults, deterministically.
    fn offline_model() -> Arc<ModelClient> {
        Arc::new(ModelClient::new("http://127.0.0.1:9", Duration::from_millis(300)).unwrap())
    }

    fn enricher(venue: MockVenueApi) -> Enricher {
        Enricher::new(
            Arc::new(venue),
            offline_model(),
            "BaseMint111".to_string(),
            1_000_000_000,
            1000,
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let store = temp_store().await;
        let err = enricher(MockVenueApi::new())
            .enrich(&store, "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_both_probes_succeed() {
        let mut venue = MockVenueApi::new();
        venue.expect_quote().returning(|input, _, _, _| {
            if input == "BaseMint111" {
                // Buy: 2% impact on 1 base unit -> depth 0.5.
                Ok(Quote {
                    in_amount: 1_000_000_000,
                    out_amount: 5_000_000,
                    price_impact: 0.02,
                })
            } else {
                // Sell: 4% impact, twice the buy impact.
                Ok(Quote {
                    in_amount: 5_000_000,
                    out_amount: 900_000_000,
                    price_impact: 0.04,
                })
            }
        });

        let store = temp_store().await;
        store
            .put_token(&TokenRecord::sample("mintA"))
            .await
            .unwrap();

        let fv = enricher(venue).enrich(&store, "mintA").await.unwrap();
        assert!((fv.liquidity - 0.5).abs() < 1e-9);
        assert!((fv.price_impact - 0.02).abs() < 1e-12);
        assert!((fv.buy_sell_ratio - 2.0).abs() < 1e-3);
        // Oracle offline: neutral defaults.
        assert_eq!(fv.ai_score, 0.5);
        assert_eq!(fv.risk_score, 0.5);
        assert_eq!(fv.holders, 50);
        assert_eq!(fv.confidence, 0.3);
        assert_eq!(fv.volatility, VOLATILITY_BASELINE);
        assert_eq!(fv.creator_score, CREATOR_SCORE_BASELINE);
        assert!(fv.time_to_pool >= 0.0);
    }

    #[tokio::test]
    async fn test_sell_probe_failure_skews_ratio_up() {
        let mut venue = MockVenueApi::new();
        venue.expect_quote().returning(|input, _, _, _| {
            if input == "BaseMint111" {
                Ok(Quote {
                    in_amount: 1_000_000_000,
                    out_amount: 5_000_000,
                    price_impact: 0.02,
                })
            } else {
                Err(PipelineError::UpstreamUnavailable("no exit route".to_string()))
            }
        });

        let store = temp_store().await;
        store
            .put_token(&TokenRecord::sample("mintA"))
            .await
            .unwrap();

        let fv = enricher(venue).enrich(&store, "mintA").await.unwrap();
        assert_eq!(fv.buy_sell_ratio, 10.0);
    }

    #[tokio::test]
    async fn test_buy_probe_failure_falls_back_to_detection_values() {
        let mut venue = MockVenueApi::new();
        venue.expect_quote().returning(|_, _, _, _| {
            Err(PipelineError::UpstreamUnavailable("down".to_string()))
        });

        let store = temp_store().await;
        let record = TokenRecord::sample("mintA");
        store.put_token(&record).await.unwrap();

        let fv = enricher(venue).enrich(&store, "mintA").await.unwrap();
        assert_eq!(fv.liquidity, record.liquidity);
        assert_eq!(fv.price_impact, DEFAULT_IMPACT);
        assert_eq!(fv.buy_sell_ratio, 1.0);
    }

    #[tokio::test]
    async fn test_ratio_clamped_at_bounds() {
        let mut venue = MockVenueApi::new();
        venue.expect_quote().returning(|input, _, _, _| {
            if input == "BaseMint111" {
                Ok(Quote {
                    in_amount: 1_000_000_000,
                    out_amount: 5_000_000,
                    price_impact: 0.0001,
                })
            } else {
                // Sell impact 1000x the buy impact.
                Ok(Quote {
                    in_amount: 5_000_000,
                    out_amount: 1,
                    price_impact: 0.1,
                })
            }
        });

        let store = temp_store().await;
        store
            .put_token(&TokenRecord::sample("mintA"))
            .await
            .unwrap();

        let fv = enricher(venue).enrich(&store, "mintA").await.unwrap();
        assert_eq!(fv.buy_sell_ratio, BUY_SELL_MAX);
    }
}
