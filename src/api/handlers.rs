use crate::api::AppState;
use crate::catalog::{
    ApplicationChanges, ApplicationDetail, ApplicationView, CapabilityChanges, CapabilityView,
    NewApplication, NewCapability, TreeApplication,
};
use crate::error::{AppError, Result};
use crate::models::{EntityId, IncidentLogEntry, IncidentOutcome, OutcomeStatus, Severity, Tag};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        app: state.app_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub app: String,
    pub version: String,
}

/// Applications and capabilities available for selection
pub async fn get_tree(State(state): State<AppState>) -> Result<Json<Vec<TreeApplication>>> {
    Ok(Json(state.catalog.tree().await?))
}

/// Create an incident for the selected applications and capabilities.
///
/// Gateway failures are reported in the body with `status: "error"`; only
/// malformed requests are rejected with a 4xx.
pub async fn create_incident(
    State(state): State<AppState>,
    Json(request): Json<CreateIncidentRequest>,
) -> Result<Json<IncidentResponse>> {
    request.validate()?;

    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title: must not be blank".to_string()));
    }
    if request.application_ids.is_empty() && request.capability_ids.is_empty() {
        return Err(AppError::Validation(
            "At least one application or capability must be selected".to_string(),
        ));
    }

    let outcome = state
        .incidents
        .create_incident(
            request.title.trim(),
            request.severity,
            &request.application_ids,
            &request.capability_ids,
        )
        .await;

    Ok(Json(IncidentResponse::from(outcome)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIncidentRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    pub severity: Severity,
    #[serde(default)]
    pub application_ids: Vec<EntityId>,
    #[serde(default)]
    pub capability_ids: Vec<EntityId>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct IncidentResponse {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grafana_incident_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grafana_incident_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<IncidentOutcome> for IncidentResponse {
    fn from(outcome: IncidentOutcome) -> Self {
        Self {
            status: outcome.status,
            grafana_incident_id: outcome.incident_id,
            grafana_incident_url: outcome.incident_url,
            message: outcome.message,
        }
    }
}

/// Audit log, newest first
pub async fn list_incident_log(
    State(state): State<AppState>,
    Query(params): Query<LogQuery>,
) -> Result<Json<IncidentLogResponse>> {
    let page = params.page.unwrap_or(0);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let store = state.incidents.store();
    let entries = store.list_incident_logs(page, page_size).await?;
    let total = store.count_incident_logs().await?;

    Ok(Json(IncidentLogResponse {
        entries,
        total,
        page,
        page_size,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct IncidentLogResponse {
    pub entries: Vec<IncidentLogEntry>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

pub async fn list_applications(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApplicationView>>> {
    Ok(Json(state.catalog.list_applications().await?))
}

pub async fn create_application(
    State(state): State<AppState>,
    Json(request): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationView>)> {
    request.validate()?;

    let created = state
        .catalog
        .create_application(NewApplication {
            name: request.name,
            description: request.description,
            tags: request.tags,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApplicationRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Get an application with its capabilities
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<Json<ApplicationDetail>> {
    Ok(Json(state.catalog.get_application(id).await?))
}

pub async fn update_application(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<ApplicationView>> {
    request.validate()?;

    let updated = state
        .catalog
        .update_application(
            id,
            ApplicationChanges {
                name: request.name,
                description: request.description,
                tags: request.tags,
            },
        )
        .await?;

    Ok(Json(updated))
}

/// Shared body for application and capability updates
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<StatusCode> {
    state.catalog.delete_application(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_capability(
    State(state): State<AppState>,
    Json(request): Json<CreateCapabilityRequest>,
) -> Result<(StatusCode, Json<CapabilityView>)> {
    request.validate()?;

    let created = state
        .catalog
        .create_capability(NewCapability {
            application_id: request.application_id,
            name: request.name,
            description: request.description,
            tags: request.tags,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCapabilityRequest {
    pub application_id: EntityId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn get_capability(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<Json<CapabilityView>> {
    Ok(Json(state.catalog.get_capability(id).await?))
}

pub async fn update_capability(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<CapabilityView>> {
    request.validate()?;

    let updated = state
        .catalog
        .update_capability(
            id,
            CapabilityChanges {
                name: request.name,
                description: request.description,
                tags: request.tags,
            },
        )
        .await?;

    Ok(Json(updated))
}

pub async fn delete_capability(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<StatusCode> {
    state.catalog.delete_capability(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Tag registry, sorted by value
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>> {
    Ok(Json(state.catalog.list_tags().await?))
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
