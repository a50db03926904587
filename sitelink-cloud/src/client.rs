use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::auth::Authenticator;
use crate::config::CloudConfig;
use crate::error::{CloudError, Result};
use crate::models::{
    AlertRequest, BaseStation, CloudMetric, CommandResultReport, DiagnosisRequest,
    DiagnosisResponse, ErrorBody, MetricsBatchRequest, MetricsBatchResponse, PendingCommand,
    StationList, StationRegistration, StatusUpdate,
};

const HEALTH_PATH: &str = "/actuator/health";
const STATIONS_PATH: &str = "/api/v1/stations";

/// Client for the management backend.
pub struct CloudClient {
    http: reqwest::Client,
    config: CloudConfig,
    auth: Arc<Authenticator>,
}

impl CloudClient {
    pub fn new(config: CloudConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let auth = Arc::new(Authenticator::new(http.clone(), &config));

        Ok(Self { http, config, auth })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    pub async fn login(&self) -> Result<()> {
        self.auth.login().await
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Send an authenticated request, retrying within the configured budget.
    ///
    /// Up to `retry_attempts + 1` attempts with `retry_delay` between them.
    /// Missing credentials fail at once. A 401 triggers one re-login per
    /// call; a second 401 after that re-login is an auth failure. Returns
    /// `None` for a 2xx answer with an empty body.
    pub async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_with_query(method, path, &[], body).await
    }

    /// [`request`](Self::request) with query parameters appended to the URL.
    pub async fn request_with_query<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.url(path);
        let attempts = self.config.retry_attempts.saturating_add(1);
        let mut reauthenticated = false;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay()).await;
            }

            match self
                .attempt(method.clone(), &url, query, body, &mut reauthenticated)
                .await
            {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(method = %method, path = %path, attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(CloudError::RetryAfterReauth) => {
                    tracing::info!(method = %method, path = %path, attempt, "Re-authenticated, retrying request");
                    last_error = Some(CloudError::RetryAfterReauth);
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        method = %method,
                        path = %path,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Request failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(CloudError::RetriesExhausted {
            attempts,
            last: Box::new(last_error.unwrap_or(CloudError::RetryAfterReauth)),
        })
    }

    /// One attempt of [`request`](Self::request).
    async fn attempt<B, T>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        reauthenticated: &mut bool,
    ) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let header = self.auth.get_auth_header()?;

        let mut builder = self
            .http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, header);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if *reauthenticated {
                return Err(CloudError::AuthFailed(
                    "request rejected with 401 after re-login".into(),
                ));
            }

            tracing::warn!(url = %url, "Backend answered 401, logging in again");
            return match self.auth.login().await {
                Ok(()) => {
                    *reauthenticated = true;
                    Err(CloudError::RetryAfterReauth)
                }
                Err(e @ CloudError::AuthFailed(_)) => Err(e),
                Err(e) => Err(CloudError::AuthFailed(e.to_string())),
            };
        }

        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message =
                ErrorBody::parse(&bytes).unwrap_or_else(|| format!("status {}", status.as_u16()));
            return Err(CloudError::Http {
                status: status.as_u16(),
                message,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CloudError::Decode(format!("{}: {}", url, e)))
    }

    /// Upload a batch of metrics. An empty batch is not sent.
    pub async fn upload_metrics(
        &self,
        station_id: &str,
        metrics: &[CloudMetric],
    ) -> Result<MetricsBatchResponse> {
        if metrics.is_empty() {
            tracing::debug!(station = %station_id, "No metrics to upload");
            return Ok(MetricsBatchResponse::default());
        }

        let body = MetricsBatchRequest {
            station_id: station_id.to_string(),
            metrics: metrics.to_vec(),
        };
        let response: MetricsBatchResponse = self
            .request(Method::POST, "/api/v1/metrics/batch", Some(&body))
            .await?
            .unwrap_or_default();

        tracing::debug!(station = %station_id, count = metrics.len(), "Metrics uploaded");
        Ok(response)
    }

    pub async fn update_device_status(&self, station_id: &str, status: &StatusUpdate) -> Result<()> {
        let path = format!("/api/base-stations/{}/status", station_id);
        self.request::<_, IgnoredAny>(Method::PUT, &path, Some(status))
            .await?;
        Ok(())
    }

    pub async fn get_pending_commands(&self, station_id: &str) -> Result<Vec<PendingCommand>> {
        let path = format!("/api/base-stations/{}/commands/pending", station_id);
        Ok(self
            .request::<(), Vec<PendingCommand>>(Method::GET, &path, None)
            .await?
            .unwrap_or_default())
    }

    pub async fn report_command_result(
        &self,
        station_id: &str,
        command_id: i64,
        result: &CommandResultReport,
    ) -> Result<()> {
        let path = format!(
            "/api/base-stations/{}/commands/{}/result",
            station_id, command_id
        );
        self.request::<_, IgnoredAny>(Method::POST, &path, Some(result))
            .await?;
        Ok(())
    }

    pub async fn send_alert(&self, alert: &AlertRequest) -> Result<()> {
        self.request::<_, IgnoredAny>(Method::POST, "/api/alerts", Some(alert))
            .await?;
        Ok(())
    }

    /// Look a station up by exact name.
    pub async fn get_base_station_by_name(&self, name: &str) -> Result<Option<BaseStation>> {
        let stations = self
            .request_with_query::<(), StationList>(
                Method::GET,
                STATIONS_PATH,
                &[("name", name)],
                None,
            )
            .await?
            .map(StationList::into_vec)
            .unwrap_or_default();

        Ok(stations.into_iter().find(|s| s.name == name))
    }

    /// Create a station record.
    pub async fn register_station(&self, registration: &StationRegistration) -> Result<BaseStation> {
        self.request(Method::POST, STATIONS_PATH, Some(registration))
            .await?
            .ok_or_else(|| CloudError::Decode("empty response to station registration".into()))
    }

    pub async fn request_diagnosis(&self, request: &DiagnosisRequest) -> Result<DiagnosisResponse> {
        self.request(Method::POST, "/api/ai/diagnose", Some(request))
            .await?
            .ok_or_else(|| CloudError::Decode("empty diagnosis response".into()))
    }

    /// Unauthenticated connectivity probe. Single attempt.
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .http
            .get(self.config.url(HEALTH_PATH))
            .timeout(Duration::from_secs(5).min(self.config.request_timeout()))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CloudError::Http {
                status: status.as_u16(),
                message: format!("status {}", status.as_u16()),
            })
        }
    }
}
