//! Jupiter aggregator client.
//!
//! Token API: `GET {token_api_base}/mints/tradable` and
//! `GET {token_api_base}/token/{address}`.
//! Quote API: `GET {quote_api_base}/quote?inputMint=..&outputMint=..`.
//!
//! Amount fields arrive as JSON strings and are parsed defensively;
//! non-2xx responses and parse failures are recoverable errors, never
//! panics. Every call retries with exponential backoff, except that a
//! 404 on the token endpoint resolves to `Ok(None)` immediately.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{Quote, TokenMeta, VenueApi};
use crate::retry::retry_async;
use crate::types::PipelineError;

const VENUE_NAME: &str = "jupiter";

/// Per-request HTTP timeout. Retries are layered on top.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    address: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    decimals: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: serde_json::Value,
    out_amount: serde_json::Value,
    #[serde(default)]
    price_impact_pct: Option<serde_json::Value>,
}

/// Jupiter encodes amounts as strings and impact sometimes as a string,
/// sometimes as a number. Accept both.
fn value_to_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct JupiterClient {
    http: Client,
    token_api_base: String,
    quote_api_base: String,
    retry_attempts: usize,
    retry_initial_delay: Duration,
}

impl JupiterClient {
    pub fn new(
        token_api_base: &str,
        quote_api_base: &str,
        retry_attempts: usize,
        retry_initial_delay: Duration,
    ) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("mintwatch/0.1.0")
            .build()
            .map_err(|e| PipelineError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            token_api_base: token_api_base.trim_end_matches('/').to_string(),
            quote_api_base: quote_api_base.trim_end_matches('/').to_string(),
            retry_attempts,
            retry_initial_delay,
        })
    }

    /// GET a URL and deserialize the JSON body, classifying failures.
    /// `Ok(None)` means HTTP 404.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, PipelineError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(format!("{url}: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamUnavailable(format!(
                "{url}: HTTP {}",
                resp.status()
            )));
        }

        let parsed = resp
            .json::<T>()
            .await
            .map_err(|e| PipelineError::MalformedResponse(format!("{url}: {e}")))?;
        Ok(Some(parsed))
    }

    /// Retry wrapper; a 404 short-circuits out of the retry loop.
    async fn get_json_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, PipelineError> {
        retry_async(
            |attempt| async move {
                if attempt > 1 {
                    debug!(url, attempt, "Retrying venue call");
                }
                self.get_json(url, query).await
            },
            self.retry_attempts,
            self.retry_initial_delay,
        )
        .await
    }
}

#[async_trait]
impl VenueApi for JupiterClient {
    async fn list_tradable(&self) -> Result<Vec<String>, PipelineError> {
        let url = format!("{}/mints/tradable", self.token_api_base);
        let mints: Option<Vec<String>> = self.get_json_with_retry(&url, &[]).await?;
        // A 404 on the list endpoint means the venue has nothing for us.
        Ok(mints.unwrap_or_default())
    }

    async fn token_meta(&self, address: &str) -> Result<Option<TokenMeta>, PipelineError> {
        let url = format!("{}/token/{}", self.token_api_base, address);
        let info: Option<TokenInfoResponse> = self.get_json_with_retry(&url, &[]).await?;

        Ok(info.map(|i| TokenMeta {
            symbol: i
                .symbol
                .unwrap_or_else(|| i.address.chars().take(6).collect()),
            name: i.name.unwrap_or_default(),
            decimals: i.decimals.unwrap_or(9),
            address: i.address,
        }))
    }

    async fn quote(
        &self,
        input: &str,
        output: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<Quote, PipelineError> {
        let url = format!("{}/quote", self.quote_api_base);
        let query = [
            ("inputMint", input.to_string()),
            ("outputMint", output.to_string()),
            ("amount", amount.to_string()),
            ("slippageBps", slippage_bps.to_string()),
        ];

        let resp: Option<QuoteResponse> = self.get_json_with_retry(&url, &query).await?;
        let resp = resp.ok_or_else(|| {
            PipelineError::UpstreamUnavailable(format!("no route {input} -> {output}"))
        })?;

        let in_amount = value_to_u64(&resp.in_amount).ok_or_else(|| {
            PipelineError::MalformedResponse("quote inAmount not numeric".to_string())
        })?;
        let out_amount = value_to_u64(&resp.out_amount).ok_or_else(|| {
            PipelineError::MalformedResponse("quote outAmount not numeric".to_string())
        })?;
        // Impact is reported in percent; normalise to a fraction.
        let price_impact = resp
            .price_impact_pct
            .as_ref()
            .and_then(value_to_f64)
            .map(|pct| pct / 100.0)
            .unwrap_or(0.0);

        Ok(Quote {
            in_amount,
            out_amount,
            price_impact,
        })
    }

    fn name(&self) -> &str {
        VENUE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
