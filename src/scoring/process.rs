//! Process-transport scorer.
//!
//! Writes the feature map to a JSON file, runs the evaluator binary, and
//! pulls the `"score"` value out of whatever the binary prints. The
//! evaluator owns the file path; concurrent calls are serialized by the
//! single evaluator task upstream.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use super::{feature_payload, Scorer};
use crate::types::{FeatureVector, PipelineError};

pub struct ProcessScorer {
    input_path: PathBuf,
    executable: PathBuf,
}

impl ProcessScorer {
    pub fn new(input_path: &str, executable: &str) -> Self {
        Self {
            input_path: PathBuf::from(input_path),
            executable: PathBuf::from(executable),
        }
    }
}

#[async_trait]
impl Scorer for ProcessScorer {
    async fn score(&self, features: &FeatureVector) -> Result<f64, PipelineError> {
        let payload = serde_json::to_vec_pretty(&feature_payload(features))
            .map_err(|e| PipelineError::ScoringUnavailable(e.to_string()))?;
        tokio::fs::write(&self.input_path, payload)
            .await
            .map_err(|e| {
                PipelineError::ScoringUnavailable(format!(
                    "write {}: {e}",
                    self.input_path.display()
                ))
            })?;

        let output = Command::new(&self.executable)
            .arg(&self.input_path)
            .output()
            .await
            .map_err(|e| {
                PipelineError::ScoringUnavailable(format!(
                    "spawn {}: {e}",
                    self.executable.display()
                ))
            })?;

        if !output.status.success() {
            return Err(PipelineError::ScoringUnavailable(format!(
                "{} exited with {}",
                self.executable.display(),
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(address = %features.address, output = %stdout.trim(), "Evaluator output");
        parse_score(&stdout).ok_or_else(|| {
            PipelineError::MalformedResponse(format!(
                "no score in evaluator output: {}",
                stdout.trim()
            ))
        })
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Find `"score"` in the output and parse the number after the colon.
/// Tolerates surrounding log lines and both bare and quoted values.
fn parse_score(output: &str) -> Option<f64> {
    let idx = output.find("\"score\"")?;
    let rest = &output[idx + "\"score\"".len()..];
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let rest = rest.strip_prefix('"').unwrap_or(rest);

    let end = rest
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+' || *c == 'e' || *c == 'E'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest[..end].parse().ok().filter(|v: &f64| v.is_finite())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
