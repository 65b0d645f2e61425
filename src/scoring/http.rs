//! HTTP-transport scorer.
//!
//! Posts the feature map to a scoring endpoint and reads `{"score": f}`
//! back. Used when the evaluator runs as a sidecar service instead of a
//! local binary.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{feature_payload, Scorer};
use crate::types::{FeatureVector, PipelineError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: f64,
}

pub struct HttpScorer {
    http: Client,
    url: String,
}

impl HttpScorer {
    pub fn new(url: &str) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("mintwatch/0.1.0")
            .build()
            .map_err(|e| PipelineError::ScoringUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, features: &FeatureVector) -> Result<f64, PipelineError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&feature_payload(features))
            .send()
            .await
            .map_err(|e| PipelineError::ScoringUnavailable(format!("{}: {e}", self.url)))?;

        if !resp.status().is_success() {
            return Err(PipelineError::ScoringUnavailable(format!(
                "{}: HTTP {}",
                self.url,
                resp.status()
            )));
        }

        let body: ScoreResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::MalformedResponse(format!("{}: {e}", self.url)))?;
        Ok(body.score)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_response_shape() {
        let body: ScoreResponse = serde_json::from_str(r#"{"score": 0.66}"#).unwrap();
        assert_eq!(body.score, 0.66);
        assert!(serde_json::from_str::<ScoreResponse>(r#"{"value": 0.66}"#).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let scorer = HttpScorer::new("http://127.0.0.1:9/score").unwrap();
        let err = scorer
            .score(&FeatureVector::sample("mint1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ScoringUnavailable(_)));
    }
}
