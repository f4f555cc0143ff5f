use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the store to applications, capabilities and tags.
/// Identifiers grow monotonically, so ascending id order is creation order.
pub type EntityId = u64;

/// A routing label shared by applications and capabilities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: EntityId,

    /// Value with the casing it was first created with
    pub value: String,
}

impl Tag {
    /// Key under which tag uniqueness is enforced
    pub fn normalize(value: &str) -> String {
        value.to_lowercase()
    }

    pub fn normalized(&self) -> String {
        Self::normalize(&self.value)
    }
}

/// Top-level node of the tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,

    /// Associated tags, in association order
    pub tag_ids: Vec<EntityId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Child node owned by exactly one application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Capability {
    pub id: EntityId,
    pub application_id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub tag_ids: Vec<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an application; the store assigns the id
#[derive(Debug, Clone, Default)]
pub struct ApplicationDraft {
    pub name: String,
    pub description: Option<String>,
    pub tag_ids: Vec<EntityId>,
}

/// Fields supplied when creating a capability
#[derive(Debug, Clone)]
pub struct CapabilityDraft {
    pub application_id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub tag_ids: Vec<EntityId>,
}

impl Application {
    pub fn from_draft(id: EntityId, draft: ApplicationDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: draft.name,
            description: draft.description,
            tag_ids: draft.tag_ids,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Capability {
    pub fn from_draft(id: EntityId, draft: CapabilityDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            application_id: draft.application_id,
            name: draft.name,
            description: draft.description,
            tag_ids: draft.tag_ids,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_normalization_ignores_case() {
        assert_eq!(Tag::normalize("Net:INFRA"), Tag::normalize("net:infra"));
        let tag = Tag {
            id: 1,
            value: "OnCall".to_string(),
        };
        assert_eq!(tag.normalized(), "oncall");
    }

    #[test]
    fn test_application_from_draft() {
        let app = Application::from_draft(
            7,
            ApplicationDraft {
                name: "Payments".to_string(),
                description: Some("Card processing".to_string()),
                tag_ids: vec![3, 1],
            },
        );

        assert_eq!(app.id, 7);
        assert_eq!(app.tag_ids, vec![3, 1]);
        assert_eq!(app.created_at, app.updated_at);
    }
}
