pub mod store;
pub mod sled_store;
pub mod factory;

pub use store::*;
pub use sled_store::SledStore;
pub use factory::{create_store, create_in_memory_store};

use crate::error::Result;
use crate::models::{
    Application, ApplicationDraft, Capability, CapabilityDraft, EntityId, IncidentLogEntry, Tag,
};
use async_trait::async_trait;

/// Storage for the application tree, the tag registry and the incident audit log.
///
/// Lookups by id set return each existing entity once, in ascending id order;
/// unknown ids are skipped. Tag creation is idempotent under concurrent first
/// use of the same value: exactly one tag exists per lower-cased value.
#[async_trait]
pub trait BridgeStore: Send + Sync {
    /// Create an application; fails with `Conflict` when the name is taken
    async fn create_application(&self, draft: ApplicationDraft) -> Result<Application>;

    /// Get an application by ID
    async fn get_application(&self, id: EntityId) -> Result<Option<Application>>;

    /// Replace a stored application
    async fn update_application(&self, application: &Application) -> Result<()>;

    /// Delete an application together with its capabilities
    async fn delete_application(&self, id: EntityId) -> Result<()>;

    /// All applications ordered by name
    async fn list_applications(&self) -> Result<Vec<Application>>;

    async fn applications_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Application>>;

    /// Create a capability; the owning application must exist
    async fn create_capability(&self, draft: CapabilityDraft) -> Result<Capability>;

    async fn get_capability(&self, id: EntityId) -> Result<Option<Capability>>;

    async fn update_capability(&self, capability: &Capability) -> Result<()>;

    async fn delete_capability(&self, id: EntityId) -> Result<()>;

    /// Capabilities of one application ordered by name
    async fn list_capabilities(&self, application_id: EntityId) -> Result<Vec<Capability>>;

    async fn capabilities_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Capability>>;

    /// Return the tag matching `value` case-insensitively, creating it on first use
    async fn get_or_create_tag(&self, value: &str) -> Result<Tag>;

    /// Tags for the given ids, in the requested order; unknown ids are skipped
    async fn tags_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Tag>>;

    /// All tags ordered by value
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Append an audit entry
    async fn append_incident_log(&self, entry: &IncidentLogEntry) -> Result<()>;

    /// Audit entries, newest first
    async fn list_incident_logs(&self, page: u32, page_size: u32) -> Result<Vec<IncidentLogEntry>>;

    async fn count_incident_logs(&self) -> Result<u64>;
}

/// Sorted, duplicate-free copy of an id selection
pub(crate) fn ordered_ids(ids: &[EntityId]) -> Vec<EntityId> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub(crate) fn application_name_conflict() -> crate::error::AppError {
    crate::error::AppError::Conflict("Application name already exists".to_string())
}

pub(crate) fn capability_name_conflict() -> crate::error::AppError {
    crate::error::AppError::Conflict(
        "Capability name already exists for this application".to_string(),
    )
}
