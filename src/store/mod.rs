//! Persistence layer.
//!
//! A single SQLite database backs the three durable structures the
//! pipeline needs across restarts:
//! - `tokens`: one row per asset ever seen (the dedup set), with
//!   `detected_at` doubling as the chronological index
//! - `processed`: markers proving an asset completed evaluation
//! - `strategies`: per-strategy match and performance counters
//!
//! `put_token` and `mark_processed` are `INSERT OR IGNORE` and report
//! whether a row was actually inserted; that insert is the only atomicity
//! boundary the concurrency model relies on.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{PipelineError, StrategyPerformance, TokenRecord};

/// How long to wait between connection attempts while the database file
/// (or its volume) is unavailable.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `path`, retrying up to
    /// `connect_attempts` times. Exhausting the budget is process-fatal at
    /// the call site.
    pub async fn open(path: &str, connect_attempts: usize) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let mut last_err = None;
        for attempt in 1..=connect_attempts.max(1) {
            match SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(opts.clone())
                .await
            {
                Ok(pool) => {
                    let store = Store { pool };
                    store.init_schema().await?;
                    info!(path, "Store opened");
                    return Ok(store);
                }
                Err(e) => {
                    warn!(path, attempt, error = %e, "Store connection failed");
                    last_err = Some(e);
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }

        Err(last_err.unwrap()).context(format!(
            "Store unreachable after {connect_attempts} attempts: {path}"
        ))
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tokens (
                address     TEXT PRIMARY KEY,
                payload     TEXT NOT NULL,
                detected_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS processed (
                address      TEXT PRIMARY KEY,
                processed_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS strategies (
                id          TEXT PRIMARY KEY,
                match_count INTEGER NOT NULL DEFAULT 0,
                last_match  TEXT,
                roi_sum     REAL NOT NULL DEFAULT 0,
                roi_sec_sum REAL NOT NULL DEFAULT 0,
                trades      INTEGER NOT NULL DEFAULT 0,
                wins        INTEGER NOT NULL DEFAULT 0,
                drawdowns   REAL NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tokens_detected ON tokens (detected_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // -- Dedup set -------------------------------------------------------

    /// Whether an asset has already been seen.
    pub async fn exists(&self, address: &str) -> Result<bool, PipelineError> {
        let row = sqlx::query("SELECT 1 FROM tokens WHERE address = ?1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a record if its address is unseen. Returns `true` when this
    /// call inserted the row; `false` means another writer got there first.
    pub async fn put_token(&self, record: &TokenRecord) -> Result<bool, PipelineError> {
        let payload = serde_json::to_string(record)
            .map_err(|e| PipelineError::MalformedResponse(e.to_string()))?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO tokens (address, payload, detected_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&record.address)
        .bind(&payload)
        .bind(record.detected_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_token(&self, address: &str) -> Result<Option<TokenRecord>, PipelineError> {
        let row = sqlx::query("SELECT payload FROM tokens WHERE address = ?1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                let record = serde_json::from_str(&payload)
                    .map_err(|e| PipelineError::MalformedResponse(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// The `n` most recently detected addresses, newest first.
    pub async fn list_recent(&self, n: usize) -> Result<Vec<String>, PipelineError> {
        let rows = sqlx::query("SELECT address FROM tokens ORDER BY detected_at DESC LIMIT ?1")
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("address").map_err(Into::into))
            .collect()
    }

    // -- Processed markers -----------------------------------------------

    /// Record that an asset has entered evaluation. Returns `true` exactly
    /// once per address; duplicate deliveries see `false` and must skip.
    pub async fn mark_processed(&self, address: &str) -> Result<bool, PipelineError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO processed (address, processed_at) VALUES (?1, ?2)",
        )
        .bind(address)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        let fresh = result.rows_affected() == 1;
        if !fresh {
            debug!(address, "Already processed, skipping");
        }
        Ok(fresh)
    }

    // -- Strategy counters -----------------------------------------------

    /// Increment a strategy's match counter and remember the asset that
    /// triggered it.
    pub async fn record_match(
        &self,
        strategy_id: &str,
        address: &str,
    ) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO strategies (id, match_count, last_match)
             VALUES (?1, 1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                 match_count = match_count + 1,
                 last_match = excluded.last_match",
        )
        .bind(strategy_id)
        .bind(address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Accumulate a trade outcome into a strategy's performance counters.
    pub async fn record_result(
        &self,
        strategy_id: &str,
        roi: f64,
        roi_per_sec: f64,
    ) -> Result<(), PipelineError> {
        let win = if roi > 0.0 { 1i64 } else { 0 };
        let drawdown = if roi < 0.0 { roi } else { 0.0 };

        sqlx::query(
            "INSERT INTO strategies (id, roi_sum, roi_sec_sum, trades, wins, drawdowns)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 roi_sum = roi_sum + excluded.roi_sum,
                 roi_sec_sum = roi_sec_sum + excluded.roi_sec_sum,
                 trades = trades + 1,
                 wins = wins + excluded.wins,
                 drawdowns = drawdowns + excluded.drawdowns",
        )
        .bind(strategy_id)
        .bind(roi)
        .bind(roi_per_sec)
        .bind(win)
        .bind(drawdown)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All strategy counters, ordered by id.
    pub async fn strategy_stats(
        &self,
    ) -> Result<Vec<(String, StrategyPerformance)>, PipelineError> {
        let rows = sqlx::query(
            "SELECT id, roi_sum, roi_sec_sum, trades, wins, drawdowns
             FROM strategies ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            stats.push((
                id,
                StrategyPerformance {
                    roi_sum: row.try_get("roi_sum")?,
                    roi_sec_sum: row.try_get("roi_sec_sum")?,
                    trades: row.try_get::<i64, _>("trades")? as u64,
                    wins: row.try_get::<i64, _>("wins")? as u64,
                    drawdowns: row.try_get("drawdowns")?,
                },
            ));
        }
        Ok(stats)
    }

    /// A strategy's match counter and last matched asset, if any.
    pub async fn match_info(
        &self,
        strategy_id: &str,
    ) -> Result<Option<(u64, Option<String>)>, PipelineError> {
        let row = sqlx::query("SELECT match_count, last_match FROM strategies WHERE id = ?1")
            .bind(strategy_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let count: i64 = row.try_get("match_count")?;
                let last: Option<String> = row.try_get("last_match")?;
                Ok(Some((count as u64, last)))
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
