//! AI scoring oracle client.
//!
//! Posts a fixed-order feature array to the model server's `/predict`
//! endpoint and maps the response into an `AiPrediction`. The call races
//! a deadline; timeouts, transport failures, and malformed bodies all
//! degrade to neutral defaults, so this client never fails its caller.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::types::{
    DEFAULT_AI_SCORE, DEFAULT_CONFIDENCE, DEFAULT_HOLDERS, DEFAULT_RISK_SCORE, PipelineError,
};

/// Feature order expected by the model:
/// [time_since_launch, holders, volatility, creator_score].
pub const PREDICT_FEATURE_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Raw `/predict` body. Every field individually optional so one malformed
/// value never poisons the rest.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    roi_per_sec: Option<f64>,
    #[serde(default)]
    risk_score: Option<f64>,
    #[serde(default)]
    holder_estimate: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Oracle outputs after defaulting. `ai_score` is derived from the sign
/// of the predicted ROI on a successful call (0.8 positive, 0.4
/// otherwise) and stays at the neutral 0.5 when the call failed.
#[derive(Debug, Clone, Copy)]
pub struct AiPrediction {
    pub ai_score: f64,
    pub predicted_roi_per_sec: f64,
    pub risk_score: f64,
    pub holders: u32,
    pub confidence: f64,
}

impl Default for AiPrediction {
    fn default() -> Self {
        Self {
            ai_score: DEFAULT_AI_SCORE,
            predicted_roi_per_sec: 0.0,
            risk_score: DEFAULT_RISK_SCORE,
            holders: DEFAULT_HOLDERS,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl AiPrediction {
    fn from_response(resp: PredictResponse) -> Self {
        let roi = resp.roi_per_sec.filter(|v| v.is_finite()).unwrap_or(0.0);
        Self {
            ai_score: if roi > 0.0 { 0.8 } else { 0.4 },
            predicted_roi_per_sec: roi,
            risk_score: resp
                .risk_score
                .filter(|v| v.is_finite())
                .unwrap_or(DEFAULT_RISK_SCORE),
            holders: resp
                .holder_estimate
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u32)
                .unwrap_or(DEFAULT_HOLDERS),
            confidence: resp
                .confidence
                .filter(|v| v.is_finite())
                .unwrap_or(DEFAULT_CONFIDENCE),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ModelClient {
    http: Client,
    base_url: String,
    deadline: Duration,
}

impl ModelClient {
    pub fn new(base_url: &str, deadline: Duration) -> Result<Self, PipelineError> {
        // The transport timeout sits above the prediction deadline; the
        // deadline race is what callers observe on a stalled server.
        let http = Client::builder()
            .timeout(deadline.saturating_add(Duration::from_secs(1)))
            .user_agent("mintwatch/0.1.0")
            .build()
            .map_err(|e| PipelineError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            deadline,
        })
    }

    /// Predict for one asset. Infallible by contract: the deadline race
    /// loses to the neutral defaults.
    pub async fn predict(&self, features: [f64; PREDICT_FEATURE_COUNT]) -> AiPrediction {
        match timeout(self.deadline, self.call_predict(features)).await {
            Ok(Ok(prediction)) => prediction,
            Ok(Err(e)) => {
                warn!(error = %e, "AI oracle call failed, using neutral defaults");
                AiPrediction::default()
            }
            Err(_) => {
                warn!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    "AI oracle timed out, using neutral defaults"
                );
                AiPrediction::default()
            }
        }
    }

    async fn call_predict(
        &self,
        features: [f64; PREDICT_FEATURE_COUNT],
    ) -> Result<AiPrediction, PipelineError> {
        let url = format!("{}/predict", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "features": features }))
            .send()
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(format!("{url}: {e}")))?;

        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamUnavailable(format!(
                "{url}: HTTP {}",
                resp.status()
            )));
        }

        let body: PredictResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::MalformedResponse(format!("{url}: {e}")))?;

        let prediction = AiPrediction::from_response(body);
        debug!(
            roi_per_sec = prediction.predicted_roi_per_sec,
            risk = prediction.risk_score,
            holders = prediction.holders,
            "AI oracle prediction"
        );
        Ok(prediction)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prediction_is_neutral() {
        let p = AiPrediction::default();
        assert_eq!(p.ai_score, 0.5);
        assert_eq!(p.risk_score, 0.5);
        assert_eq!(p.holders, 50);
        assert_eq!(p.confidence, 0.3);
        assert_eq!(p.predicted_roi_per_sec, 0.0);
    }

    #[test]
    fn test_positive_roi_maps_to_high_score() {
        let resp: PredictResponse = serde_json::from_str(
            r#"{"roi_per_sec": 0.002, "risk_score": 0.2, "holder_estimate": 120, "confidence": 0.9}"#,
        )
        .unwrap();
        let p = AiPrediction::from_response(resp);
        assert_eq!(p.ai_score, 0.8);
        assert_eq!(p.holders, 120);
        assert_eq!(p.risk_score, 0.2);
        assert_eq!(p.confidence, 0.9);
    }

    #[test]
    fn test_non_positive_roi_maps_to_low_score() {
        let resp: PredictResponse =
            serde_json::from_str(r#"{"roi_per_sec": -0.001}"#).unwrap();
        assert_eq!(AiPrediction::from_response(resp).ai_score, 0.4);
    }

    #[test]
    fn test_missing_fields_individually_defaulted() {
        let resp: PredictResponse = serde_json::from_str(r#"{"roi_per_sec": 0.001}"#).unwrap();
        let p = AiPrediction::from_response(resp);
        assert_eq!(p.ai_score, 0.8); // roi present and positive
        assert_eq!(p.risk_score, 0.5); // defaulted
        assert_eq!(p.holders, 50); // defaulted
        assert_eq!(p.confidence, 0.3); // defaulted
    }

    #[test]
    fn test_negative_holder_estimate_defaulted() {
        let resp: PredictResponse =
            serde_json::from_str(r#"{"holder_estimate": -5}"#).unwrap();
        assert_eq!(AiPrediction::from_response(resp).holders, 50);
    }

    #[tokio::test]
    async fn test_stalled_server_times_out_to_defaults() {
        // A listener that accepts and then never answers, so the deadline
        // expires rather than the connection failing.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let _hold = sock;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                });
            }
        });

        let client =
            ModelClient::new(&format!("http://{addr}"), Duration::from_millis(200)).unwrap();
        let p = client.predict([60.0, 50.0, 0.2, 0.8]).await;
        assert_eq!(p.ai_score, 0.5);
        assert_eq!(p.risk_score, 0.5);
        assert_eq!(p.holders, 50);
        assert_eq!(p.confidence, 0.3);
    }

    #[tokio::test]
    async fn test_unreachable_server_yields_defaults() {
        // Connection refused resolves well inside the deadline.
        let client =
            ModelClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let p = client.predict([60.0, 50.0, 0.2, 0.8]).await;
        assert_eq!(p.ai_score, 0.5);
        assert_eq!(p.holders, 50);
        assert_eq!(p.confidence, 0.3);
    }
}
