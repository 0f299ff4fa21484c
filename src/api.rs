use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, KpiEndpoint};
use crate::error::DashboardError;
use crate::models::{BackendKpiRecord, Envelope, ModelStatus, PredictionDataPoint};
use crate::prediction::{
    LabelStyle, ModelKind, PredictionRequest, PredictionResponse, PredictionResult,
};
use crate::source::DashboardSource;

/// HTTP client for the analytics backend and the prediction service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    kpi_endpoint: KpiEndpoint,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        kpi_endpoint: KpiEndpoint,
        timeout: Duration,
    ) -> Result<Self, DashboardError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| DashboardError::Transport {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            kpi_endpoint,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, DashboardError> {
        Self::new(&config.base_url, config.kpi_endpoint, config.timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn fetch_model_predictions(
        &self,
        model_id: &str,
    ) -> Result<Vec<PredictionDataPoint>, DashboardError> {
        let url = self.url(&format!("/models/{model_id}/predictions"));
        let body = self.execute(self.http.get(&url), &url).await?;
        into_data(decode::<Envelope<Vec<PredictionDataPoint>>>(&body, &url)?, &url)
    }

    /// Asks the backend to retrain a model. Returns the backend's message, if any.
    pub async fn retrain_model(&self, model_id: &str) -> Result<Option<String>, DashboardError> {
        let url = self.url(&format!("/models/{model_id}/retrain"));
        let body = self.execute(self.http.post(&url), &url).await?;
        let envelope: Envelope<serde_json::Value> = decode(&body, &url)?;

        if !envelope.success {
            return Err(DashboardError::envelope(
                envelope
                    .error
                    .unwrap_or_else(|| format!("Failed to retrain model {model_id}")),
            ));
        }
        Ok(envelope.message)
    }

    pub async fn predict(
        &self,
        kind: ModelKind,
        request: &PredictionRequest,
        style: LabelStyle,
    ) -> Result<PredictionResult, DashboardError> {
        let url = self.url(&format!("/predict/{}", kind.path_segment()));
        let body = self.execute(self.http.post(&url).json(request), &url).await?;
        into_prediction(decode(&body, &url)?, kind, style)
    }

    /// Prediction for a student the backend already knows; no feature body is sent.
    pub async fn predict_by_id(
        &self,
        kind: ModelKind,
        student_id: u64,
        style: LabelStyle,
    ) -> Result<PredictionResult, DashboardError> {
        let url = self.url(&format!("/predict/{}/{student_id}", kind.path_segment()));
        let body = self.execute(self.http.post(&url), &url).await?;
        into_prediction(decode(&body, &url)?, kind, style)
    }

    async fn execute(&self, request: RequestBuilder, url: &str) -> Result<String, DashboardError> {
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!("backend_request", %request_id, url);

        async move {
            let started = Instant::now();
            let response = request
                .header("x-request-id", request_id.to_string())
                .send()
                .await
                .map_err(|source| DashboardError::Transport {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|source| DashboardError::Transport {
                    url: url.to_string(),
                    source,
                })?;

            tracing::debug!(
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Backend responded"
            );

            if !status.is_success() {
                let message = error_message(&body)
                    .or_else(|| status.canonical_reason().map(str::to_string))
                    .unwrap_or_else(|| "request failed".to_string());
                tracing::warn!(status = status.as_u16(), %message, "Backend request failed");
                return Err(DashboardError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    message,
                });
            }

            Ok::<_, DashboardError>(body)
        }
        .instrument(span)
        .await
    }
}

impl DashboardSource for ApiClient {
    fn describe(&self) -> String {
        format!("live backend at {}", self.base_url)
    }

    async fn fetch_kpi_records(&self) -> Result<Vec<BackendKpiRecord>, DashboardError> {
        let url = self.url(self.kpi_endpoint.path());
        let body = self.execute(self.http.get(&url), &url).await?;
        into_data(decode::<Envelope<Vec<BackendKpiRecord>>>(&body, &url)?, &url)
    }

    async fn fetch_model_status(&self) -> Result<ModelStatus, DashboardError> {
        let url = self.url("/models/status");
        let body = self.execute(self.http.get(&url), &url).await?;
        into_data(decode::<Envelope<ModelStatus>>(&body, &url)?, &url)
    }
}

fn decode<T: DeserializeOwned>(body: &str, url: &str) -> Result<T, DashboardError> {
    serde_json::from_str(body).map_err(|source| DashboardError::Decode {
        url: url.to_string(),
        source,
    })
}

fn into_data<T>(envelope: Envelope<T>, url: &str) -> Result<T, DashboardError> {
    if !envelope.success {
        return Err(DashboardError::envelope(
            envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| format!("request to {url} was not successful")),
        ));
    }
    envelope
        .data
        .ok_or_else(|| DashboardError::envelope(format!("response from {url} carried no data")))
}

fn into_prediction(
    response: PredictionResponse,
    kind: ModelKind,
    style: LabelStyle,
) -> Result<PredictionResult, DashboardError> {
    if !response.success {
        return Err(DashboardError::envelope(
            response.error.unwrap_or_else(|| "Prediction failed".to_string()),
        ));
    }
    let raw = response
        .prediction
        .ok_or_else(|| DashboardError::envelope("prediction response carried no prediction"))?;
    Ok(PredictionResult::new(raw, kind, style, response.message))
}

/// Pulls `error` (or `message`) out of a JSON error body, falling back to the raw text.
fn error_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }

    let trimmed = body.trim();
    (!trimmed.is_empty() && trimmed.len() <= 200).then(|| trimmed.to_string())
}
