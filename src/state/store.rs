use crate::error::{AppError, Result};
use crate::models::{
    Application, ApplicationDraft, Capability, CapabilityDraft, EntityId, IncidentLogEntry, Tag,
};
use crate::state::{
    application_name_conflict, capability_name_conflict, ordered_ids, BridgeStore,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory store (for development and testing)
#[derive(Clone)]
pub struct InMemoryStore {
    next_id: Arc<AtomicU64>,
    applications: Arc<DashMap<EntityId, Application>>,
    application_names: Arc<DashMap<String, EntityId>>,
    capabilities: Arc<DashMap<EntityId, Capability>>,
    capability_names: Arc<DashMap<(EntityId, String), EntityId>>,
    tags: Arc<DashMap<EntityId, Tag>>,
    tag_index: Arc<DashMap<String, EntityId>>,
    incident_log: Arc<RwLock<Vec<IncidentLogEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            applications: Arc::new(DashMap::new()),
            application_names: Arc::new(DashMap::new()),
            capabilities: Arc::new(DashMap::new()),
            capability_names: Arc::new(DashMap::new()),
            tags: Arc::new(DashMap::new()),
            tag_index: Arc::new(DashMap::new()),
            incident_log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn next_id(&self) -> EntityId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn remove_capability_entry(&self, id: EntityId) -> Option<Capability> {
        let (_, capability) = self.capabilities.remove(&id)?;
        self.capability_names
            .remove(&(capability.application_id, capability.name.clone()));
        Some(capability)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BridgeStore for InMemoryStore {
    async fn create_application(&self, draft: ApplicationDraft) -> Result<Application> {
        let id = match self.application_names.entry(draft.name.clone()) {
            Entry::Occupied(_) => return Err(application_name_conflict()),
            Entry::Vacant(slot) => {
                let id = self.next_id();
                slot.insert(id);
                id
            }
        };

        let application = Application::from_draft(id, draft);
        self.applications.insert(id, application.clone());

        tracing::debug!(application_id = id, name = %application.name, "Application saved");
        Ok(application)
    }

    async fn get_application(&self, id: EntityId) -> Result<Option<Application>> {
        Ok(self.applications.get(&id).map(|entry| entry.clone()))
    }

    async fn update_application(&self, application: &Application) -> Result<()> {
        // The row stays locked until the rename is done, so concurrent renames
        // of one application release only the name they replaced.
        let mut existing = self
            .applications
            .get_mut(&application.id)
            .ok_or_else(|| AppError::NotFound(format!("Application {} not found", application.id)))?;

        if existing.name != application.name {
            match self.application_names.entry(application.name.clone()) {
                Entry::Occupied(_) => return Err(application_name_conflict()),
                Entry::Vacant(slot) => {
                    slot.insert(application.id);
                }
            }
            self.application_names.remove(&existing.name);
        }

        *existing = application.clone();
        drop(existing);
        tracing::debug!(application_id = application.id, "Application updated");
        Ok(())
    }

    async fn delete_application(&self, id: EntityId) -> Result<()> {
        let (_, application) = self
            .applications
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Application {} not found", id)))?;
        self.application_names.remove(&application.name);

        let owned: Vec<EntityId> = self
            .capabilities
            .iter()
            .filter(|entry| entry.application_id == id)
            .map(|entry| *entry.key())
            .collect();
        for capability_id in &owned {
            self.remove_capability_entry(*capability_id);
        }

        tracing::debug!(
            application_id = id,
            capabilities_removed = owned.len(),
            "Application deleted"
        );
        Ok(())
    }

    async fn list_applications(&self) -> Result<Vec<Application>> {
        let mut applications: Vec<Application> = self
            .applications
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        applications.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(applications)
    }

    async fn applications_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Application>> {
        Ok(ordered_ids(ids)
            .into_iter()
            .filter_map(|id| self.applications.get(&id).map(|entry| entry.clone()))
            .collect())
    }

    async fn create_capability(&self, draft: CapabilityDraft) -> Result<Capability> {
        // Holding the owner's guard makes a concurrent delete wait until the
        // capability is visible to its cascade.
        let _owner = self.applications.get(&draft.application_id).ok_or_else(|| {
            AppError::NotFound(format!("Application {} not found", draft.application_id))
        })?;

        let id = match self
            .capability_names
            .entry((draft.application_id, draft.name.clone()))
        {
            Entry::Occupied(_) => return Err(capability_name_conflict()),
            Entry::Vacant(slot) => {
                let id = self.next_id();
                slot.insert(id);
                id
            }
        };

        let capability = Capability::from_draft(id, draft);
        self.capabilities.insert(id, capability.clone());

        tracing::debug!(
            capability_id = id,
            application_id = capability.application_id,
            "Capability saved"
        );
        Ok(capability)
    }

    async fn get_capability(&self, id: EntityId) -> Result<Option<Capability>> {
        Ok(self.capabilities.get(&id).map(|entry| entry.clone()))
    }

    async fn update_capability(&self, capability: &Capability) -> Result<()> {
        let mut existing = self
            .capabilities
            .get_mut(&capability.id)
            .ok_or_else(|| AppError::NotFound(format!("Capability {} not found", capability.id)))?;

        if existing.name != capability.name {
            match self
                .capability_names
                .entry((existing.application_id, capability.name.clone()))
            {
                Entry::Occupied(_) => return Err(capability_name_conflict()),
                Entry::Vacant(slot) => {
                    slot.insert(capability.id);
                }
            }
            self.capability_names
                .remove(&(existing.application_id, existing.name.clone()));
        }

        let application_id = existing.application_id;
        *existing = capability.clone();
        existing.application_id = application_id;
        drop(existing);
        tracing::debug!(capability_id = capability.id, "Capability updated");
        Ok(())
    }

    async fn delete_capability(&self, id: EntityId) -> Result<()> {
        self.remove_capability_entry(id)
            .ok_or_else(|| AppError::NotFound(format!("Capability {} not found", id)))?;
        tracing::debug!(capability_id = id, "Capability deleted");
        Ok(())
    }

    async fn list_capabilities(&self, application_id: EntityId) -> Result<Vec<Capability>> {
        let mut capabilities: Vec<Capability> = self
            .capabilities
            .iter()
            .filter(|entry| entry.application_id == application_id)
            .map(|entry| entry.value().clone())
            .collect();
        capabilities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(capabilities)
    }

    async fn capabilities_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Capability>> {
        Ok(ordered_ids(ids)
            .into_iter()
            .filter_map(|id| self.capabilities.get(&id).map(|entry| entry.clone()))
            .collect())
    }

    async fn get_or_create_tag(&self, value: &str) -> Result<Tag> {
        let id = *self
            .tag_index
            .entry(Tag::normalize(value))
            .or_insert_with(|| {
                let id = self.next_id();
                self.tags.insert(
                    id,
                    Tag {
                        id,
                        value: value.to_string(),
                    },
                );
                tracing::debug!(tag_id = id, value = %value, "Tag created");
                id
            });

        self.tags
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::Internal(format!("Tag index points at missing tag {}", id)))
    }

    async fn tags_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Tag>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.tags.get(id).map(|entry| entry.clone()))
            .collect())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut tags: Vec<Tag> = self.tags.iter().map(|entry| entry.value().clone()).collect();
        tags.sort_by(|a, b| a.value.cmp(&b.value));
        Ok(tags)
    }

    async fn append_incident_log(&self, entry: &IncidentLogEntry) -> Result<()> {
        self.incident_log.write().push(entry.clone());
        tracing::debug!(log_id = %entry.id, "Incident log entry saved");
        Ok(())
    }

    async fn list_incident_logs(&self, page: u32, page_size: u32) -> Result<Vec<IncidentLogEntry>> {
        let start = (page as usize).saturating_mul(page_size as usize);
        Ok(self
            .incident_log
            .read()
            .iter()
            .rev()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn count_incident_logs(&self) -> Result<u64> {
        Ok(self.incident_log.read().len() as u64)
    }
}
