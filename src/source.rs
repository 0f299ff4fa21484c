use crate::error::DashboardError;
use crate::models::{BackendKpiRecord, ModelStatus};

/// Where dashboard data comes from. Callers pick an implementation up front;
/// a failing live source is never swapped for fixture data.
#[allow(async_fn_in_trait)]
pub trait DashboardSource {
    fn describe(&self) -> String;

    async fn fetch_kpi_records(&self) -> Result<Vec<BackendKpiRecord>, DashboardError>;

    async fn fetch_model_status(&self) -> Result<ModelStatus, DashboardError>;
}
