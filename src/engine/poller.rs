//! Detection poller.
//!
//! Each cycle pulls the tradable list, filters out assets already in the
//! store, probes each new one with a shallow quote to estimate depth, and
//! records it. Assets at or above the liquidity floor are announced on the
//! bus; the rest are marked processed immediately so they are never looked
//! at again. Per-asset failures are logged and skipped, a failed listing
//! fails the whole cycle.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::BASE_UNIT;
use crate::bus::NotificationBus;
use crate::store::Store;
use crate::types::{PipelineError, TokenRecord, DEFAULT_IMPACT};
use crate::venue::VenueApi;

/// Swap fee assumed for venues that do not report one.
const DEFAULT_SWAP_FEE: f64 = 0.25;

/// What one poll cycle did, for the cycle-summary log line.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub candidates: usize,
    pub already_seen: usize,
    pub recorded: usize,
    pub published: usize,
    pub below_floor: usize,
    pub failures: usize,
}

pub struct Poller {
    venue: Arc<dyn VenueApi>,
    store: Arc<Store>,
    bus: NotificationBus,
    base_mint: String,
    probe_amount: u64,
    slippage_bps: u32,
    scan_interval: Duration,
    min_liquidity: f64,
    batch_size: usize,
    item_delay: Duration,
}

impl Poller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        venue: Arc<dyn VenueApi>,
        store: Arc<Store>,
        bus: NotificationBus,
        base_mint: String,
        probe_amount: u64,
        slippage_bps: u32,
        scan_interval: Duration,
        min_liquidity: f64,
        batch_size: usize,
        item_delay: Duration,
    ) -> Self {
        Self {
            venue,
            store,
            bus,
            base_mint,
            probe_amount,
            slippage_bps,
            scan_interval,
            min_liquidity,
            batch_size,
            item_delay,
        }
    }

    /// Poll forever. Store failures are fatal; anything else is logged and
    /// the next cycle starts on schedule.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            venue = self.venue.name(),
            interval_secs = self.scan_interval.as_secs(),
            min_liquidity = self.min_liquidity,
            "Poller started"
        );
        let mut interval = tokio::time::interval(self.scan_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.run_cycle().await {
                Ok(summary) => {
                    info!(
                        candidates = summary.candidates,
                        recorded = summary.recorded,
                        published = summary.published,
                        below_floor = summary.below_floor,
                        already_seen = summary.already_seen,
                        failures = summary.failures,
                        "Poll cycle complete"
                    );
                }
                Err(e @ PipelineError::Store(_)) => {
                    error!(error = %e, "Poll cycle hit a store failure, shutting down");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(error = %e, "Poll cycle failed, will retry next tick");
                }
            }
        }
    }

    /// One detection pass over the venue's tradable list.
    pub async fn run_cycle(&self) -> Result<CycleSummary, PipelineError> {
        let mut summary = CycleSummary::default();

        let candidates = self.venue.list_tradable().await?;
        summary.candidates = candidates.len();

        // The batch budget counts unseen candidates only. A long stable
        // prefix of known mints must never starve new listings further
        // down the list.
        let mut examined = 0usize;
        for address in candidates {
            if examined >= self.batch_size {
                break;
            }
            if self.store.exists(&address).await? {
                summary.already_seen += 1;
                continue;
            }
            examined += 1;

            match self.detect_one(&address).await {
                Ok(Some(record)) => {
                    summary.recorded += 1;
                    if record.liquidity < self.min_liquidity {
                        // Recorded for dedup, but never worth evaluating.
                        self.store.mark_processed(&address).await?;
                        summary.below_floor += 1;
                        debug!(
                            token = %record,
                            min_liquidity = self.min_liquidity,
                            "Below liquidity floor, not publishing"
                        );
                    } else {
                        info!(token = %record, "New token detected");
                        self.bus.publish(&address);
                        summary.published += 1;
                    }
                }
                Ok(None) => {
                    // Another writer recorded it mid-cycle, or the venue
                    // no longer knows the asset.
                    summary.already_seen += 1;
                }
                Err(e @ PipelineError::Store(_)) => return Err(e),
                Err(e) => {
                    warn!(address, error = %e, "Failed to process candidate");
                    summary.failures += 1;
                }
            }

            tokio::time::sleep(self.item_delay).await;
        }

        Ok(summary)
    }

    /// Probe and record one unseen candidate. `Ok(None)` means the asset
    /// should be silently dropped this cycle.
    async fn detect_one(&self, address: &str) -> Result<Option<TokenRecord>, PipelineError> {
        let meta = match self.venue.token_meta(address).await? {
            Some(meta) => meta,
            None => {
                debug!(address, "Venue has no metadata, dropping");
                return Ok(None);
            }
        };

        // A failed probe is treated as zero depth, which routes the asset
        // through the below-floor path rather than inventing a number.
        let (liquidity, impact) = match self
            .venue
            .quote(&self.base_mint, address, self.probe_amount, self.slippage_bps)
            .await
        {
            Ok(quote) => (
                quote.depth_at_one_percent(self.probe_amount as f64 / BASE_UNIT),
                quote.price_impact,
            ),
            Err(e) => {
                warn!(address, error = %e, "Detection probe failed, assuming zero depth");
                (0.0, DEFAULT_IMPACT)
            }
        };

        let record = TokenRecord {
            address: meta.address,
            symbol: meta.symbol,
            liquidity,
            volume: 0.0,
            swap_fee: DEFAULT_SWAP_FEE,
            tx_rate: 0.0,
            impact,
            detected_at: Utc::now().timestamp_millis(),
        };

        if self.store.put_token(&record).await? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
