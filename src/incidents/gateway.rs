use crate::config::GrafanaConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::GrafanaSeverity;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

const CREATE_INCIDENT_PATH: &str =
    "/api/plugins/grafana-irm-app/resources/api/v1/IncidentsService.CreateIncident";
const INCIDENT_PAGE_PATH: &str = "/a/grafana-irm-app/incidents";

/// Failure of a single incident-creation call
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No access token configured; raised before any network I/O
    #[error("Grafana IRM API token is not configured")]
    MissingCredential,

    #[error("Request to Grafana IRM timed out after {0} seconds")]
    Timeout(u64),

    #[error("Failed to connect to Grafana IRM: {0}")]
    Transport(String),

    #[error("Grafana IRM API error: {status}")]
    Protocol { status: u16, body: String },

    #[error("Invalid response from Grafana IRM: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Short label for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MissingCredential => "configuration",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Transport(_) => "transport",
            GatewayError::Protocol { .. } => "protocol",
            GatewayError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Key/value pair derived from a tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub key: String,
    pub label: String,
}

impl Label {
    /// `key:value` splits on the first colon; anything else is used as both
    pub fn from_tag(tag: &str) -> Self {
        match tag.split_once(':') {
            Some((key, value)) => Self {
                key: key.to_string(),
                label: value.to_string(),
            },
            None => Self {
                key: tag.to_string(),
                label: tag.to_string(),
            },
        }
    }
}

/// An incident confirmed by the external platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIncident {
    pub incident_id: String,
    pub incident_url: String,
}

/// Client seam for the external incident-management API
#[async_trait]
pub trait IncidentGateway: Send + Sync {
    /// Create one incident. A single attempt is made; retries are the caller's call.
    async fn create_incident(
        &self,
        title: &str,
        severity: GrafanaSeverity,
        tags: &[String],
    ) -> std::result::Result<CreatedIncident, GatewayError>;
}

#[derive(Debug, Serialize)]
struct CreateIncidentRequest<'a> {
    title: &'a str,
    severity: GrafanaSeverity,
    labels: Vec<Label>,
}

#[derive(Debug, Default, Deserialize)]
struct CreateIncidentResponse {
    #[serde(default)]
    incident: Option<IncidentBody>,
}

#[derive(Debug, Default, Deserialize)]
struct IncidentBody {
    #[serde(rename = "incidentID", default)]
    incident_id: Option<serde_json::Value>,
    #[serde(rename = "overviewURL", default)]
    overview_url: Option<String>,
}

impl IncidentBody {
    fn id_string(&self) -> String {
        match &self.incident_id {
            Some(serde_json::Value::String(id)) => id.clone(),
            Some(serde_json::Value::Null) | None => "unknown".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Grafana IRM incident client
#[derive(Clone)]
pub struct GrafanaIrmClient {
    pub(crate) base_url: String,
    pub(crate) api_token: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) client: Client,
}

impl GrafanaIrmClient {
    /// Create a new client. A missing token is accepted here and reported per call.
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.filter(|token| !token.is_empty()),
            timeout,
            client,
        })
    }

    pub fn from_config(config: &GrafanaConfig) -> Result<Self> {
        Self::new(
            config.base_url(),
            config.api_token(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn has_api_token(&self) -> bool {
        self.api_token.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CREATE_INCIDENT_PATH)
    }

    /// Link to the incident: the overview path when Grafana returns one,
    /// otherwise the plugin's incident page for `incident_id`
    fn incident_url(&self, incident_id: &str, overview_url: Option<&str>) -> String {
        match overview_url.filter(|path| !path.is_empty()) {
            Some(path) => format!("{}{}", self.base_url, path),
            None => format!("{}{}/{}", self.base_url, INCIDENT_PAGE_PATH, incident_id),
        }
    }

    fn build_request<'a>(
        title: &'a str,
        severity: GrafanaSeverity,
        tags: &[String],
    ) -> CreateIncidentRequest<'a> {
        CreateIncidentRequest {
            title,
            severity,
            labels: tags.iter().map(|tag| Label::from_tag(tag)).collect(),
        }
    }

    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout.as_secs())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }

    async fn send(
        &self,
        token: &str,
        request: &CreateIncidentRequest<'_>,
    ) -> std::result::Result<CreatedIncident, GatewayError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if status.as_u16() >= 400 {
            return Err(GatewayError::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CreateIncidentResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let incident = parsed.incident.unwrap_or_default();
        let incident_id = incident.id_string();
        let incident_url = self.incident_url(&incident_id, incident.overview_url.as_deref());

        Ok(CreatedIncident {
            incident_id,
            incident_url,
        })
    }
}

#[async_trait]
impl IncidentGateway for GrafanaIrmClient {
    async fn create_incident(
        &self,
        title: &str,
        severity: GrafanaSeverity,
        tags: &[String],
    ) -> std::result::Result<CreatedIncident, GatewayError> {
        let token = self.api_token.as_deref().ok_or(GatewayError::MissingCredential)?;

        let request = Self::build_request(title, severity, tags);
        info!(title = %title, severity = %severity, "Creating incident in Grafana IRM");
        debug!(payload = ?request, "Grafana IRM payload");

        let started = Instant::now();
        let result = self.send(token, &request).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(created) => {
                metrics::observe_gateway_call("success", elapsed);
                info!(incident_id = %created.incident_id, "Incident created successfully");
            }
            Err(GatewayError::Protocol { status, body }) => {
                metrics::observe_gateway_call("protocol", elapsed);
                error!(status = status, body = %body, "Grafana IRM API error");
            }
            Err(e) => {
                metrics::observe_gateway_call(e.kind(), elapsed);
                error!(kind = e.kind(), error = %e, "Failed to create incident in Grafana IRM");
            }
        }

        result
    }
}
