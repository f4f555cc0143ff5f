use crate::error::{AppError, Result};
use crate::models::{
    Application, ApplicationDraft, Capability, CapabilityDraft, EntityId, IncidentLogEntry, Tag,
};
use crate::state::{
    application_name_conflict, capability_name_conflict, ordered_ids, BridgeStore,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    Transactional,
};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent store using the Sled embedded database.
///
/// Entity trees are keyed by big-endian ids so iteration runs in ascending id
/// order. Application and capability names are claimed in the same transaction
/// that writes the row; lower-cased tag values are claimed by compare-and-swap
/// on the tag index.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    applications_tree: sled::Tree,
    application_names_tree: sled::Tree,
    capabilities_tree: sled::Tree,
    capability_names_tree: sled::Tree,
    tags_tree: sled::Tree,
    tag_index_tree: sled::Tree,
    incident_log_tree: sled::Tree,
}

impl SledStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let open = |name: &str| {
            db.open_tree(name).map_err(|e| {
                AppError::Database(format!("Failed to open {} tree: {}", name, e))
            })
        };

        let store = Self {
            applications_tree: open("applications")?,
            application_names_tree: open("application_names")?,
            capabilities_tree: open("capabilities")?,
            capability_names_tree: open("capability_names")?,
            tags_tree: open("tags")?,
            tag_index_tree: open("tag_index")?,
            incident_log_tree: open("incident_log")?,
            db: Arc::new(db),
        };

        tracing::info!("Initialized Sled store at {:?}", path_ref);
        Ok(store)
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(|e| {
            AppError::Database(format!("Failed to flush database: {}", e))
        })?;
        Ok(())
    }

    fn generate_id(&self) -> Result<EntityId> {
        // sled ids start at 0; keep 0 free so it never names a real entity
        Ok(self.db.generate_id()? + 1)
    }

    fn id_key(id: EntityId) -> [u8; 8] {
        id.to_be_bytes()
    }

    fn decode_id(bytes: &[u8]) -> Result<EntityId> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| AppError::Database("Corrupt id in index tree".to_string()))?;
        Ok(EntityId::from_be_bytes(raw))
    }

    fn capability_name_key(application_id: EntityId, name: &str) -> Vec<u8> {
        let mut key = Self::id_key(application_id).to_vec();
        key.extend_from_slice(name.as_bytes());
        key
    }

    /// Chronological key: creation time in nanoseconds, then the entry id
    fn incident_log_key(entry: &IncidentLogEntry) -> Vec<u8> {
        let nanos = entry.created_at.timestamp_nanos_opt().unwrap_or_default();
        let mut key = (nanos as u64).to_be_bytes().to_vec();
        key.extend_from_slice(entry.id.as_bytes());
        key
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn read<T: DeserializeOwned>(tree: &sled::Tree, id: EntityId) -> Result<Option<T>> {
        match tree.get(Self::id_key(id))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_many<T: DeserializeOwned>(tree: &sled::Tree, ids: &[EntityId]) -> Result<Vec<T>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(value) = Self::read(tree, *id)? {
                found.push(value);
            }
        }
        Ok(found)
    }

    fn scan<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for result in tree.iter() {
            let (_, value) = result?;
            values.push(Self::decode(&value)?);
        }
        Ok(values)
    }

    /// Claim `key` in an index tree; returns false when it is already held
    fn claim(tree: &sled::Tree, key: &[u8], id: EntityId) -> Result<bool> {
        let swapped = tree.compare_and_swap(
            key,
            None as Option<&[u8]>,
            Some(Self::id_key(id).to_vec()),
        )?;
        Ok(swapped.is_ok())
    }

    fn decode_in_transaction<T: DeserializeOwned>(
        bytes: &[u8],
    ) -> std::result::Result<T, ConflictableTransactionError<AppError>> {
        Self::decode(bytes).map_err(ConflictableTransactionError::Abort)
    }

    fn transaction_error(err: TransactionError<AppError>) -> AppError {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => e.into(),
        }
    }

    fn lookup_tag(&self, normalized: &str) -> Result<Option<Tag>> {
        match self.tag_index_tree.get(normalized.as_bytes())? {
            Some(id_bytes) => Self::read(&self.tags_tree, Self::decode_id(&id_bytes)?),
            None => Ok(None),
        }
    }

    fn remove_capability_entry(&self, capability: &Capability) -> Result<()> {
        self.capabilities_tree.remove(Self::id_key(capability.id))?;
        self.capability_names_tree.remove(Self::capability_name_key(
            capability.application_id,
            &capability.name,
        ))?;
        Ok(())
    }
}

#[async_trait]
impl BridgeStore for SledStore {
    async fn create_application(&self, draft: ApplicationDraft) -> Result<Application> {
        let id = self.generate_id()?;
        let key = Self::id_key(id);
        let application = Application::from_draft(id, draft);
        let row = Self::encode(&application)?;

        (&self.applications_tree, &self.application_names_tree)
            .transaction(
                |(applications, names)| -> ConflictableTransactionResult<(), AppError> {
                    if names.get(application.name.as_bytes())?.is_some() {
                        return abort(application_name_conflict());
                    }
                    names.insert(application.name.as_bytes(), &key[..])?;
                    applications.insert(&key[..], row.as_slice())?;
                    Ok(())
                },
            )
            .map_err(Self::transaction_error)?;
        self.applications_tree.flush()?;

        tracing::debug!(application_id = id, name = %application.name, "Application saved to Sled");
        Ok(application)
    }

    async fn get_application(&self, id: EntityId) -> Result<Option<Application>> {
        Self::read(&self.applications_tree, id)
    }

    async fn update_application(&self, application: &Application) -> Result<()> {
        let key = Self::id_key(application.id);
        let row = Self::encode(application)?;

        // The current name is read inside the transaction, so concurrent
        // renames of one application release only the name they replaced.
        (&self.applications_tree, &self.application_names_tree)
            .transaction(
                |(applications, names)| -> ConflictableTransactionResult<(), AppError> {
                    let existing: Application = match applications.get(key)? {
                        Some(bytes) => Self::decode_in_transaction(&bytes)?,
                        None => {
                            return abort(AppError::NotFound(format!(
                                "Application {} not found",
                                application.id
                            )))
                        }
                    };

                    if existing.name != application.name {
                        if names.get(application.name.as_bytes())?.is_some() {
                            return abort(application_name_conflict());
                        }
                        names.insert(application.name.as_bytes(), &key[..])?;
                        names.remove(existing.name.as_bytes())?;
                    }

                    applications.insert(&key[..], row.as_slice())?;
                    Ok(())
                },
            )
            .map_err(Self::transaction_error)?;
        self.applications_tree.flush()?;

        tracing::debug!(application_id = application.id, "Application updated in Sled");
        Ok(())
    }

    async fn delete_application(&self, id: EntityId) -> Result<()> {
        let key = Self::id_key(id);

        // Unpublish the application first. Capability creation checks the
        // owner in the same transaction as its insert, so after this commit
        // no new capability can attach and the scan below sees every one.
        (&self.applications_tree, &self.application_names_tree)
            .transaction(
                |(applications, names)| -> ConflictableTransactionResult<(), AppError> {
                    let application: Application = match applications.remove(&key[..])? {
                        Some(bytes) => Self::decode_in_transaction(&bytes)?,
                        None => {
                            return abort(AppError::NotFound(format!(
                                "Application {} not found",
                                id
                            )))
                        }
                    };
                    names.remove(application.name.as_bytes())?;
                    Ok(())
                },
            )
            .map_err(Self::transaction_error)?;

        let owned = self.list_capabilities(id).await?;
        for capability in &owned {
            self.remove_capability_entry(capability)?;
        }
        self.db.flush()?;

        tracing::debug!(
            application_id = id,
            capabilities_removed = owned.len(),
            "Application deleted from Sled"
        );
        Ok(())
    }

    async fn list_applications(&self) -> Result<Vec<Application>> {
        let mut applications: Vec<Application> = Self::scan(&self.applications_tree)?;
        applications.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(applications)
    }

    async fn applications_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Application>> {
        Self::read_many(&self.applications_tree, &ordered_ids(ids))
    }

    async fn create_capability(&self, draft: CapabilityDraft) -> Result<Capability> {
        let id = self.generate_id()?;
        let key = Self::id_key(id);
        let owner_key = Self::id_key(draft.application_id);
        let name_key = Self::capability_name_key(draft.application_id, &draft.name);
        let capability = Capability::from_draft(id, draft);
        let row = Self::encode(&capability)?;

        (
            &self.applications_tree,
            &self.capabilities_tree,
            &self.capability_names_tree,
        )
            .transaction(
                |(applications, capabilities, names)| -> ConflictableTransactionResult<(), AppError> {
                    if applications.get(owner_key)?.is_none() {
                        return abort(AppError::NotFound(format!(
                            "Application {} not found",
                            capability.application_id
                        )));
                    }
                    if names.get(name_key.as_slice())?.is_some() {
                        return abort(capability_name_conflict());
                    }
                    names.insert(name_key.as_slice(), &key[..])?;
                    capabilities.insert(&key[..], row.as_slice())?;
                    Ok(())
                },
            )
            .map_err(Self::transaction_error)?;
        self.capabilities_tree.flush()?;

        tracing::debug!(
            capability_id = id,
            application_id = capability.application_id,
            "Capability saved to Sled"
        );
        Ok(capability)
    }

    async fn get_capability(&self, id: EntityId) -> Result<Option<Capability>> {
        Self::read(&self.capabilities_tree, id)
    }

    async fn update_capability(&self, capability: &Capability) -> Result<()> {
        let key = Self::id_key(capability.id);

        (&self.capabilities_tree, &self.capability_names_tree)
            .transaction(
                |(capabilities, names)| -> ConflictableTransactionResult<(), AppError> {
                    let existing: Capability = match capabilities.get(key)? {
                        Some(bytes) => Self::decode_in_transaction(&bytes)?,
                        None => {
                            return abort(AppError::NotFound(format!(
                                "Capability {} not found",
                                capability.id
                            )))
                        }
                    };

                    if existing.name != capability.name {
                        let name_key =
                            Self::capability_name_key(existing.application_id, &capability.name);
                        if names.get(name_key.as_slice())?.is_some() {
                            return abort(capability_name_conflict());
                        }
                        names.insert(name_key, &key[..])?;
                        names.remove(Self::capability_name_key(
                            existing.application_id,
                            &existing.name,
                        ))?;
                    }

                    // A capability never moves between applications
                    let mut updated = capability.clone();
                    updated.application_id = existing.application_id;
                    let row = Self::encode(&updated).map_err(ConflictableTransactionError::Abort)?;
                    capabilities.insert(&key[..], row)?;
                    Ok(())
                },
            )
            .map_err(Self::transaction_error)?;
        self.capabilities_tree.flush()?;

        tracing::debug!(capability_id = capability.id, "Capability updated in Sled");
        Ok(())
    }

    async fn delete_capability(&self, id: EntityId) -> Result<()> {
        let capability: Capability = Self::read(&self.capabilities_tree, id)?
            .ok_or_else(|| AppError::NotFound(format!("Capability {} not found", id)))?;

        self.remove_capability_entry(&capability)?;
        self.capabilities_tree.flush()?;

        tracing::debug!(capability_id = id, "Capability deleted from Sled");
        Ok(())
    }

    async fn list_capabilities(&self, application_id: EntityId) -> Result<Vec<Capability>> {
        let mut capabilities: Vec<Capability> = Self::scan::<Capability>(&self.capabilities_tree)?
            .into_iter()
            .filter(|capability| capability.application_id == application_id)
            .collect();
        capabilities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(capabilities)
    }

    async fn capabilities_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Capability>> {
        Self::read_many(&self.capabilities_tree, &ordered_ids(ids))
    }

    async fn get_or_create_tag(&self, value: &str) -> Result<Tag> {
        let normalized = Tag::normalize(value);
        if let Some(tag) = self.lookup_tag(&normalized)? {
            return Ok(tag);
        }

        // Write the row before publishing it in the index so a reader that
        // finds the index entry always finds the tag.
        let tag = Tag {
            id: self.generate_id()?,
            value: value.to_string(),
        };
        self.tags_tree
            .insert(Self::id_key(tag.id), Self::encode(&tag)?)?;

        if Self::claim(&self.tag_index_tree, normalized.as_bytes(), tag.id)? {
            self.tags_tree.flush()?;
            tracing::debug!(tag_id = tag.id, value = %tag.value, "Tag created");
            return Ok(tag);
        }

        // Lost a first-use race: drop our row and return the winner.
        self.tags_tree.remove(Self::id_key(tag.id))?;
        tracing::debug!(value = %value, "Tag created concurrently, re-fetching");
        self.lookup_tag(&normalized)?.ok_or_else(|| {
            AppError::Database(format!("Tag '{}' vanished after concurrent creation", value))
        })
    }

    async fn tags_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Tag>> {
        Self::read_many(&self.tags_tree, ids)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut tags: Vec<Tag> = Self::scan(&self.tags_tree)?;
        tags.sort_by(|a, b| a.value.cmp(&b.value));
        Ok(tags)
    }

    async fn append_incident_log(&self, entry: &IncidentLogEntry) -> Result<()> {
        self.incident_log_tree
            .insert(Self::incident_log_key(entry), Self::encode(entry)?)?;
        self.incident_log_tree.flush()?;

        tracing::debug!(log_id = %entry.id, "Incident log entry saved to Sled");
        Ok(())
    }

    async fn list_incident_logs(&self, page: u32, page_size: u32) -> Result<Vec<IncidentLogEntry>> {
        let start = (page as usize).saturating_mul(page_size as usize);
        let mut entries = Vec::new();

        for result in self
            .incident_log_tree
            .iter()
            .rev()
            .skip(start)
            .take(page_size as usize)
        {
            let (_, value) = result?;
            entries.push(Self::decode(&value)?);
        }

        Ok(entries)
    }

    async fn count_incident_logs(&self) -> Result<u64> {
        Ok(self.incident_log_tree.len() as u64)
    }
}
