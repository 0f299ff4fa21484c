use thiserror::Error;

/// KPI payloads that cannot be turned into a dashboard.
#[derive(Debug, Error, PartialEq)]
pub enum KpiDataError {
    #[error("KPI {kpi_id} ({name}) has a non-numeric value: {raw:?}")]
    MalformedValue {
        kpi_id: i64,
        name: String,
        raw: String,
    },

    #[error("KPI id {kpi_id} appears more than once in the same fetch")]
    DuplicateId { kpi_id: i64 },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("backend reported failure: {message}")]
    Envelope { message: String },

    #[error("bad KPI data: {0}")]
    BadData(#[from] KpiDataError),

    #[error("fixture data unavailable: {message}")]
    Fixture { message: String },
}

impl DashboardError {
    pub fn envelope(message: impl Into<String>) -> Self {
        DashboardError::Envelope {
            message: message.into(),
        }
    }

    pub fn fixture(message: impl Into<String>) -> Self {
        DashboardError::Fixture {
            message: message.into(),
        }
    }

    /// Fetch failures (network or any HTTP status) are worth retrying;
    /// bad payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::Transport { .. }
            | DashboardError::Status { .. }
            | DashboardError::Envelope { .. } => true,
            DashboardError::Decode { .. }
            | DashboardError::BadData(_)
            | DashboardError::Fixture { .. } => false,
        }
    }

    pub fn is_bad_data(&self) -> bool {
        matches!(self, DashboardError::BadData(_))
    }

    /// 4xx usually means the client points at the wrong backend or path.
    pub fn is_client_status(&self) -> bool {
        matches!(self, DashboardError::Status { status, .. } if (400..500).contains(status))
    }
}
