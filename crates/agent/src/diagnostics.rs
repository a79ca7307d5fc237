//! Diagnostic inquiry branch: extract a monitoring target from the
//! conversation, fetch live metrics for it, and reason over the result.
//!
//! Metric query failures are reported as data ("status": "error"), never
//! raised; only the completion calls themselves can fail the pipeline.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

use terraloom_core::definition::strip_code_fences;
use terraloom_core::Turn;

use crate::llm::LlmClient;
use crate::prompts;

/// Fixed trailing query window: most recent 3 hours at 5-minute resolution.
const WINDOW_SECS: i64 = 3 * 3600;
const PERIOD_SECS: u32 = 300;
const CLI_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MetricQuery {
    pub resource_id: String,
    pub metric_name: String,
    pub namespace: String,
    pub dimension_key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricDatapoint {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Average")]
    pub average: Option<f64>,
    #[serde(rename = "Maximum")]
    pub maximum: Option<f64>,
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics cli not found: {0}")]
    CliNotFound(String),
    #[error("metrics cli failed to start: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("metrics query timed out after {0:?}")]
    Timeout(Duration),
    #[error("metrics cli exited with {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },
    #[error("metrics output not parseable: {0}")]
    Parse(String),
}

#[async_trait]
pub trait MetricsClient: Send + Sync {
    async fn fetch(&self, query: &MetricQuery) -> Result<Vec<MetricDatapoint>, MetricsError>;
}

/// CloudWatch statistics via the AWS CLI, scoped to the configured region.
pub struct CloudWatchCli {
    region: String,
}

impl CloudWatchCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self { region: region.into() }
    }
}

#[derive(Debug, Deserialize)]
struct StatisticsResponse {
    #[serde(rename = "Datapoints", default)]
    datapoints: Vec<MetricDatapoint>,
}

#[async_trait]
impl MetricsClient for CloudWatchCli {
    async fn fetch(&self, query: &MetricQuery) -> Result<Vec<MetricDatapoint>, MetricsError> {
        let aws = which::which("aws").map_err(|err| MetricsError::CliNotFound(err.to_string()))?;

        let end = Utc::now();
        let start = end - chrono::Duration::seconds(WINDOW_SECS);

        let child = Command::new(aws)
            .arg("cloudwatch")
            .arg("get-metric-statistics")
            .arg("--namespace")
            .arg(&query.namespace)
            .arg("--metric-name")
            .arg(&query.metric_name)
            .arg("--dimensions")
            .arg(format!("Name={},Value={}", query.dimension_key, query.resource_id))
            .arg("--start-time")
            .arg(start.to_rfc3339())
            .arg("--end-time")
            .arg(end.to_rfc3339())
            .arg("--period")
            .arg(PERIOD_SECS.to_string())
            .arg("--statistics")
            .arg("Average")
            .arg("Maximum")
            .arg("--region")
            .arg(&self.region)
            .arg("--output")
            .arg("json")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = tokio::time::timeout(CLI_TIMEOUT, child)
            .await
            .map_err(|_| MetricsError::Timeout(CLI_TIMEOUT))??;

        if !output.status.success() {
            return Err(MetricsError::NonZeroExit {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let parsed: StatisticsResponse = serde_json::from_slice(&output.stdout)
            .map_err(|err| MetricsError::Parse(err.to_string()))?;
        let mut datapoints = parsed.datapoints;
        datapoints.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(datapoints)
    }
}

#[derive(Debug, Deserialize)]
struct ExtractedTarget {
    resource_id: Option<String>,
    metric_name: Option<String>,
    namespace: Option<String>,
    dimension_key: Option<String>,
}

impl ExtractedTarget {
    fn into_query(self) -> Option<MetricQuery> {
        Some(MetricQuery {
            resource_id: non_empty(self.resource_id)?,
            metric_name: non_empty(self.metric_name)?,
            namespace: non_empty(self.namespace)?,
            dimension_key: non_empty(self.dimension_key)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

const MISSING_TARGET_ANSWER: &str =
    "I can look at live metrics for you, but I need the exact resource identifier first \
     (for example an EC2 instance id like `i-0abc123`), plus the metric you care about. \
     Could you share those details?";

/// Runs the two-phase diagnostic pipeline and returns the turn's answer.
pub async fn diagnose(
    llm: &dyn LlmClient,
    metrics: &dyn MetricsClient,
    history: &[Turn],
) -> Result<String> {
    let raw = llm
        .complete(&prompts::metric_extraction(history))
        .await
        .context("metric extraction completion failed")?;

    let stripped = strip_code_fences(&raw);
    let query = match serde_json::from_str::<ExtractedTarget>(&stripped) {
        Ok(target) => match target.into_query() {
            Some(query) => query,
            None => {
                tracing::debug!("extraction incomplete, asking for the resource identifier");
                return Ok(MISSING_TARGET_ANSWER.to_string());
            }
        },
        Err(err) => {
            tracing::debug!(error = %err, "extraction output unparseable, asking for the resource identifier");
            return Ok(MISSING_TARGET_ANSWER.to_string());
        }
    };

    // One shot, no retry; failure and absence are both reportable facts.
    let report = match metrics.fetch(&query).await {
        Ok(datapoints) if datapoints.is_empty() => serde_json::json!({
            "status": "no_data",
            "message": "no data in window",
            "query": query,
        }),
        Ok(datapoints) => serde_json::json!({
            "status": "ok",
            "query": query,
            "datapoints": datapoints,
        }),
        Err(err) => {
            tracing::warn!(error = %err, "metrics query failed");
            serde_json::json!({
                "status": "error",
                "message": err.to_string(),
                "query": query,
            })
        }
    };

    let answer = llm
        .complete(&prompts::metric_reasoning(history, &report.to_string()))
        .await
        .context("metric reasoning completion failed")?;
    Ok(answer.trim().to_string())
}
