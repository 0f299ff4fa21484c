use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use crate::error::DashboardError;
use crate::models::{
    BackendKpiRecord, ConfidenceBand, ModelMetrics, ModelStatus, ModelStatusSummary, ModelSummary,
    PredictionDataPoint, RawKpiValue,
};
use crate::source::DashboardSource;

const FORECAST_DAYS: i64 = 14;

/// Development data source. Used only when asked for with `--source fixture`.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    anchor: DateTime<Utc>,
    records: Vec<BackendKpiRecord>,
}

impl FixtureSource {
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            records: builtin_records(),
        }
    }

    /// Replaces the built-in KPI records with rows from a CSV file
    /// (`kpi_id,name,value,unit,category,definition`).
    pub fn from_csv(anchor: DateTime<Utc>, csv_path: &Path) -> Result<Self, DashboardError> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            kpi_id: i64,
            name: String,
            value: String,
            #[serde(default)]
            unit: String,
            category: String,
            #[serde(default)]
            definition: String,
        }

        let mut reader = csv::Reader::from_path(csv_path).map_err(|err| {
            DashboardError::fixture(format!("cannot open {}: {err}", csv_path.display()))
        })?;

        let mut records = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            let row = result.map_err(|err| {
                DashboardError::fixture(format!("bad row in {}: {err}", csv_path.display()))
            })?;
            records.push(BackendKpiRecord {
                kpi_id: row.kpi_id,
                name: row.name,
                value: RawKpiValue::Text(row.value),
                unit: row.unit,
                category: row.category,
                definition: row.definition,
            });
        }

        tracing::info!(
            path = %csv_path.display(),
            records = records.len(),
            "Loaded fixture KPI records"
        );
        Ok(Self { anchor, records })
    }
}

impl DashboardSource for FixtureSource {
    fn describe(&self) -> String {
        format!("fixture data ({} KPI records)", self.records.len())
    }

    async fn fetch_kpi_records(&self) -> Result<Vec<BackendKpiRecord>, DashboardError> {
        Ok(self.records.clone())
    }

    async fn fetch_model_status(&self) -> Result<ModelStatus, DashboardError> {
        Ok(builtin_models(self.anchor))
    }
}

fn record(
    kpi_id: i64,
    category: &str,
    name: &str,
    value: RawKpiValue,
    unit: &str,
    definition: &str,
) -> BackendKpiRecord {
    BackendKpiRecord {
        kpi_id,
        name: name.to_string(),
        value,
        unit: unit.to_string(),
        category: category.to_string(),
        definition: definition.to_string(),
    }
}

fn builtin_records() -> Vec<BackendKpiRecord> {
    use RawKpiValue::{Number, Text};

    const PERFORMANCE: &str = "Student Performance";
    const ENGAGEMENT: &str = "VLE Engagement";
    const COURSES: &str = "Course Analytics";

    vec![
        record(1, PERFORMANCE, "Total Students", Number(32593.0), "", "Total enrolled students"),
        record(2, PERFORMANCE, "Passed", Number(12361.0), "", "Students who passed"),
        record(3, PERFORMANCE, "Distinction", Number(3024.0), "", "Students with distinction"),
        record(4, PERFORMANCE, "Failed", Number(7052.0), "", "Students who failed"),
        record(5, PERFORMANCE, "Withdrawn", Number(10156.0), "", "Students who withdrew"),
        record(6, PERFORMANCE, "Avg Credits", Text("79.8".into()), "credits", "Average studied credits"),
        record(7, PERFORMANCE, "Pass Rate", Text("68.5".into()), "%", "Students passing assessments"),
        record(8, PERFORMANCE, "Average Score", Number(72.3), "pts", "Mean assessment score"),
        record(9, PERFORMANCE, "Completion Rate", Text("76.2".into()), "%", "Students completing courses"),
        record(10, ENGAGEMENT, "Total VLE Clicks", Number(55_602_131.0), "", "Total VLE interactions"),
        record(11, ENGAGEMENT, "Avg Clicks per Student", Number(1847.0), "", "Average clicks per student"),
        record(12, ENGAGEMENT, "Active Students", Number(24567.0), "", "Students with VLE activity"),
        record(13, ENGAGEMENT, "Min Clicks", Number(1.0), "", "Minimum clicks by a student"),
        record(14, ENGAGEMENT, "Max Clicks", Number(28615.0), "", "Maximum clicks by a student"),
        record(15, COURSES, "Active Courses", Number(22.0), "", "Currently running courses"),
        record(16, COURSES, "Avg Engagement Rate", Text("82.4".into()), "%", "Average student engagement per course"),
        record(17, COURSES, "At-Risk Students", Number(3842.0), "", "Students predicted to fail/withdraw"),
    ]
}

/// Straight-line forecast with a symmetric band; actuals for the first half.
fn forecast(
    anchor: DateTime<Utc>,
    start: f64,
    step: f64,
    band: f64,
    actual_offset: f64,
) -> Vec<PredictionDataPoint> {
    (0..FORECAST_DAYS)
        .map(|day| {
            let predicted = start + step * day as f64;
            PredictionDataPoint {
                date: (anchor + Duration::days(day)).date_naive(),
                actual: (day < FORECAST_DAYS / 2).then_some(predicted + actual_offset),
                predicted,
                confidence: Some(ConfidenceBand {
                    lower: predicted - band,
                    upper: predicted + band,
                }),
            }
        })
        .collect()
}

fn builtin_models(anchor: DateTime<Utc>) -> ModelStatus {
    let features = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();

    let models = vec![
        ModelSummary {
            id: "student-performance".to_string(),
            name: "Student Performance Prediction".to_string(),
            description: "Predicts student pass/fail outcomes based on VLE engagement and assessment history".to_string(),
            model_type: "XGBoost Classifier".to_string(),
            metrics: ModelMetrics {
                accuracy: 89.7,
                mae: 0.082,
                rmse: 0.124,
                r2_score: 0.86,
            },
            features: features(&[
                "VLE Clicks",
                "Assessment Scores",
                "Submission Time",
                "Demographics",
                "Previous Course History",
            ]),
            last_trained: anchor - Duration::days(2),
            next_update: Some(anchor + Duration::days(5)),
            predictions: forecast(anchor, 68.0, 0.4, 5.0, -1.2),
        },
        ModelSummary {
            id: "withdrawal-prediction".to_string(),
            name: "Student Withdrawal Prediction".to_string(),
            description: "Identifies students at high risk of course withdrawal or dropout".to_string(),
            model_type: "Random Forest Classifier".to_string(),
            metrics: ModelMetrics {
                accuracy: 87.3,
                mae: 18.5,
                rmse: 24.7,
                r2_score: 0.82,
            },
            features: features(&[
                "VLE Activity Decline",
                "Assessment Submission Rate",
                "Forum Participation",
                "Login Frequency",
                "Early Assessment Scores",
            ]),
            last_trained: anchor - Duration::days(3),
            next_update: Some(anchor + Duration::days(4)),
            predictions: forecast(anchor, 180.0, -2.5, 30.0, 6.0),
        },
        ModelSummary {
            id: "assessment-score".to_string(),
            name: "Assessment Score Prediction".to_string(),
            description: "Predicts final assessment scores based on continuous assessment and VLE engagement".to_string(),
            model_type: "Neural Network (MLP)".to_string(),
            metrics: ModelMetrics {
                accuracy: 91.4,
                mae: 6.8,
                rmse: 9.2,
                r2_score: 0.88,
            },
            features: features(&[
                "Cumulative Assessment Score",
                "VLE Engagement Level",
                "Resource Access Pattern",
                "Time Spent on Materials",
                "Peer Interaction",
            ]),
            last_trained: anchor - Duration::days(1),
            next_update: Some(anchor + Duration::days(6)),
            predictions: forecast(anchor, 74.0, 0.3, 8.0, 1.5),
        },
    ];

    let average_accuracy =
        models.iter().map(|m| m.metrics.accuracy).sum::<f64>() / models.len() as f64;

    ModelStatus {
        summary: ModelStatusSummary {
            total_models: models.len() as u32,
            average_accuracy: (average_accuracy * 100.0).round() / 100.0,
            last_updated: anchor,
        },
        models,
    }
}
