use chrono::{DateTime, Utc};

use crate::error::DashboardError;
use crate::kpi::{self, TargetTable};
use crate::models::{KpiDashboard, ModelStatus};
use crate::source::DashboardSource;

/// Fetches KPI records and normalizes them. Either the whole dashboard is
/// built or an error comes back; nothing half-normalized is returned.
pub async fn load_kpi_dashboard<S: DashboardSource>(
    source: &S,
    targets: &TargetTable,
    last_updated: DateTime<Utc>,
) -> Result<KpiDashboard, DashboardError> {
    let records = source.fetch_kpi_records().await?;
    let categories = kpi::normalize(&records, targets)?;

    tracing::info!(
        source = %source.describe(),
        records = records.len(),
        categories = categories.len(),
        targets = targets.len(),
        "KPI dashboard loaded"
    );

    Ok(KpiDashboard {
        categories,
        last_updated,
    })
}

/// KPI dashboard and model status, fetched concurrently.
pub async fn load_overview<S: DashboardSource>(
    source: &S,
    targets: &TargetTable,
    last_updated: DateTime<Utc>,
) -> Result<(KpiDashboard, ModelStatus), DashboardError> {
    tokio::try_join!(
        load_kpi_dashboard(source, targets, last_updated),
        source.fetch_model_status(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureSource;
    use crate::models::{BackendKpiRecord, RawKpiValue};
    use chrono::TimeZone;

    struct StubSource {
        records: Result<Vec<BackendKpiRecord>, String>,
    }

    impl DashboardSource for StubSource {
        fn describe(&self) -> String {
            "stub".to_string()
        }

        async fn fetch_kpi_records(&self) -> Result<Vec<BackendKpiRecord>, DashboardError> {
            self.records.clone().map_err(DashboardError::envelope)
        }

        async fn fetch_model_status(&self) -> Result<ModelStatus, DashboardError> {
            Err(DashboardError::envelope("models unavailable"))
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn dashboard_carries_the_callers_timestamp() {
        let source = FixtureSource::new(stamp());
        let dashboard = load_kpi_dashboard(&source, &TargetTable::default(), stamp())
            .await
            .unwrap();

        assert_eq!(dashboard.last_updated, stamp());
        assert_eq!(dashboard.metric_count(), 17);
    }

    #[tokio::test]
    async fn bad_record_yields_no_dashboard() {
        let source = StubSource {
            records: Ok(vec![
                BackendKpiRecord {
                    kpi_id: 1,
                    name: "Pass Rate".to_string(),
                    value: RawKpiValue::Number(68.5),
                    unit: "%".to_string(),
                    category: "Student Performance".to_string(),
                    definition: String::new(),
                },
                BackendKpiRecord {
                    kpi_id: 2,
                    name: "Avg Credits".to_string(),
                    value: RawKpiValue::Text("not-a-number".to_string()),
                    unit: String::new(),
                    category: "Student Performance".to_string(),
                    definition: String::new(),
                },
            ]),
        };

        let err = load_kpi_dashboard(&source, &TargetTable::default(), stamp())
            .await
            .unwrap_err();
        assert!(err.is_bad_data());
    }

    #[tokio::test]
    async fn fetch_failures_are_not_bad_data() {
        let source = StubSource {
            records: Err("warehouse offline".to_string()),
        };
        let err = load_kpi_dashboard(&source, &TargetTable::default(), stamp())
            .await
            .unwrap_err();
        assert!(!err.is_bad_data());
    }

    #[tokio::test]
    async fn overview_fails_when_either_half_fails() {
        let source = StubSource {
            records: Ok(Vec::new()),
        };
        let err = load_overview(&source, &TargetTable::default(), stamp())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "backend reported failure: models unavailable");
    }

    #[tokio::test]
    async fn overview_from_fixture() {
        let source = FixtureSource::new(stamp());
        let (dashboard, models) = load_overview(&source, &TargetTable::default(), stamp())
            .await
            .unwrap();
        assert_eq!(dashboard.categories.len(), 3);
        assert_eq!(models.models.len(), 3);
    }
}
