use crate::models::{Application, Capability, EntityId, Tag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input for a new application
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewApplication {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial application update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCapability {
    pub application_id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapabilityChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Application with its tag values resolved
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApplicationView {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationView {
    pub fn new(application: Application, tags: Vec<Tag>) -> Self {
        Self {
            id: application.id,
            name: application.name,
            description: application.description,
            tags: tags.into_iter().map(|tag| tag.value).collect(),
            created_at: application.created_at,
            updated_at: application.updated_at,
        }
    }
}

/// Application together with its capabilities
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: ApplicationView,
    pub capabilities: Vec<CapabilityView>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CapabilityView {
    pub id: EntityId,
    pub application_id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CapabilityView {
    pub fn new(capability: Capability, tags: Vec<Tag>) -> Self {
        Self {
            id: capability.id,
            application_id: capability.application_id,
            name: capability.name,
            description: capability.description,
            tags: tags.into_iter().map(|tag| tag.value).collect(),
            created_at: capability.created_at,
            updated_at: capability.updated_at,
        }
    }
}

/// Node of the selection tree shown to responders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeApplication {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub capabilities: Vec<TreeCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeCapability {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
}

impl From<Capability> for TreeCapability {
    fn from(capability: Capability) -> Self {
        Self {
            id: capability.id,
            name: capability.name,
            description: capability.description,
        }
    }
}
