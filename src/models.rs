use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// KPI value as the backend sends it. Some backend versions quote numbers.
/// Anything else (null, booleans, objects, a missing field) is kept as `Other`
/// so the normalizer can reject it with the record's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawKpiValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl Default for RawKpiValue {
    fn default() -> Self {
        RawKpiValue::Other(serde_json::Value::Null)
    }
}

impl fmt::Display for RawKpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawKpiValue::Number(value) => write!(f, "{value}"),
            RawKpiValue::Text(text) => f.write_str(text),
            RawKpiValue::Other(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendKpiRecord {
    pub kpi_id: i64,
    pub name: String,
    #[serde(default)]
    pub value: RawKpiValue,
    #[serde(default)]
    pub unit: String,
    pub category: String,
    #[serde(default)]
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiMetric {
    pub id: String,
    pub title: String,
    pub value: f64,
    pub unit: String,
    pub target: Option<f64>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiCategory {
    pub category: String,
    pub metrics: Vec<KpiMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiDashboard {
    pub categories: Vec<KpiCategory>,
    pub last_updated: DateTime<Utc>,
}

impl KpiDashboard {
    pub fn metric_count(&self) -> usize {
        self.categories.iter().map(|c| c.metrics.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAchievement {
    pub percentage: f64,
    pub diff: f64,
    pub is_achieved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Good => "good",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Standard `{ success, data, error }` wrapper used by every backend endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub models: Vec<ModelSummary>,
    pub summary: ModelStatusSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatusSummary {
    pub total_models: u32,
    pub average_accuracy: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model_type: String,
    pub metrics: ModelMetrics,
    #[serde(default)]
    pub features: Vec<String>,
    pub last_trained: DateTime<Utc>,
    #[serde(default)]
    pub next_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub predictions: Vec<PredictionDataPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub mae: f64,
    pub rmse: f64,
    pub r2_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDataPoint {
    pub date: NaiveDate,
    #[serde(default)]
    pub actual: Option<f64>,
    pub predicted: f64,
    #[serde(default)]
    pub confidence: Option<ConfidenceBand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub lower: f64,
    pub upper: f64,
}
