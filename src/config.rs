use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;

use crate::kpi::TargetTable;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Talk to the analytics backend over HTTP
    Live,
    /// Serve built-in development data, no network
    Fixture,
}

/// Backend versions expose the flat KPI list under different paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KpiEndpoint {
    Metrics,
    Overview,
}

impl KpiEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            KpiEndpoint::Metrics => "/kpi/metrics",
            KpiEndpoint::Overview => "/kpi/overview",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub source: SourceKind,
    pub fixture_csv: Option<PathBuf>,
    pub kpi_endpoint: KpiEndpoint,
    pub targets: TargetTable,
    pub timeout: Duration,
}

impl Config {
    pub fn new(
        base_url: &str,
        source: SourceKind,
        fixture_csv: Option<PathBuf>,
        kpi_endpoint: KpiEndpoint,
        targets_path: Option<&Path>,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let targets = match targets_path {
            Some(path) => load_targets(path)?,
            None => TargetTable::default(),
        };

        Ok(Self {
            base_url: trim_base_url(base_url),
            source,
            fixture_csv,
            kpi_endpoint,
            targets,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

/// Reads a JSON object of KPI name to target value. It replaces the built-in table.
pub fn load_targets(path: &Path) -> anyhow::Result<TargetTable> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read target table {}", path.display()))?;
    let targets: HashMap<String, f64> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON object of numbers", path.display()))?;
    tracing::info!(path = %path.display(), targets = targets.len(), "Loaded KPI target table");
    Ok(TargetTable::new(targets))
}

fn trim_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}
