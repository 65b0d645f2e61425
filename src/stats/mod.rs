//! Strategy performance tracking.
//!
//! Thin layer over the store's per-strategy counters: outcomes are
//! accumulated as they arrive and reports derive the averages on demand.

use std::sync::Arc;
use tracing::{debug, info};

use crate::store::Store;
use crate::types::{PerformanceReport, PipelineError};

pub struct StatsRecorder {
    store: Arc<Store>,
}

impl StatsRecorder {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Fold one closed-position outcome into a strategy's counters.
    pub async fn record(
        &self,
        strategy_id: &str,
        roi: f64,
        roi_per_sec: f64,
    ) -> Result<(), PipelineError> {
        self.store.record_result(strategy_id, roi, roi_per_sec).await?;
        debug!(strategy = strategy_id, roi, roi_per_sec, "Outcome recorded");
        Ok(())
    }

    /// Reports for every strategy that has any counters, ordered by id.
    pub async fn report(&self) -> Result<Vec<PerformanceReport>, PipelineError> {
        let stats = self.store.strategy_stats().await?;
        Ok(stats
            .iter()
            .map(|(id, perf)| PerformanceReport::from_counters(id, perf))
            .collect())
    }

    /// Log one summary line per strategy, typically at shutdown.
    pub async fn log_report(&self) -> Result<(), PipelineError> {
        for report in self.report().await? {
            info!(
                strategy = %report.id,
                roi_avg = report.roi_avg,
                roi_sec_avg = report.roi_sec_avg,
                win_rate = report.win_rate,
                drawdowns = report.drawdowns,
                "Strategy performance"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
