use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Internal severity used by the tree/application domain
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display,
)]
pub enum Severity {
    P1, // Critical
    P2, // Major
    P3, // Minor
    P4, // Low
}

/// Severity accepted by Grafana IRM
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GrafanaSeverity {
    Critical,
    Major,
    Minor,
}

/// Audit record of an incident confirmed by Grafana IRM.
///
/// `tags` is a copy of the aggregated values at creation time; later changes
/// to tags, applications or capabilities never touch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentLogEntry {
    pub id: Uuid,
    pub grafana_incident_id: Option<String>,
    pub title: String,
    pub severity_internal: Severity,
    pub severity_grafana: GrafanaSeverity,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl IncidentLogEntry {
    pub fn new(
        grafana_incident_id: Option<String>,
        title: String,
        severity_internal: Severity,
        severity_grafana: GrafanaSeverity,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            grafana_incident_id,
            title,
            severity_internal,
            severity_grafana,
            tags,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutcomeStatus {
    Ok,
    Error,
}

/// Result of an incident-creation request as seen by callers.
/// Failures are a normal outcome, never an error value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentOutcome {
    pub status: OutcomeStatus,
    pub incident_id: Option<String>,
    pub incident_url: Option<String>,
    pub message: Option<String>,
}

impl IncidentOutcome {
    pub fn ok(incident_id: String, incident_url: String) -> Self {
        Self {
            status: OutcomeStatus::Ok,
            incident_id: Some(incident_id),
            incident_url: Some(incident_url),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            incident_id: None,
            incident_url: None,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }
}
