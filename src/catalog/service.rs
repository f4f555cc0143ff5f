use crate::catalog::views::*;
use crate::error::{AppError, Result};
use crate::incidents::TagSet;
use crate::models::{Application, ApplicationDraft, Capability, CapabilityDraft, EntityId, Tag};
use crate::state::BridgeStore;
use chrono::Utc;
use std::sync::Arc;

const MAX_NAME_LENGTH: usize = 255;

/// Administration of applications, capabilities and their tags
pub struct CatalogService {
    store: Arc<dyn BridgeStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BridgeStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BridgeStore> {
        &self.store
    }

    pub async fn create_application(&self, input: NewApplication) -> Result<ApplicationView> {
        let name = validate_name(&input.name)?;
        let tag_ids = self.sync_tags(&input.tags).await?;

        let application = self
            .store
            .create_application(ApplicationDraft {
                name,
                description: clean_description(input.description),
                tag_ids,
            })
            .await?;

        tracing::info!(
            application_id = application.id,
            name = %application.name,
            "Application created"
        );

        self.application_view(application).await
    }

    pub async fn list_applications(&self) -> Result<Vec<ApplicationView>> {
        let mut views = Vec::new();
        for application in self.store.list_applications().await? {
            views.push(self.application_view(application).await?);
        }
        Ok(views)
    }

    /// Application with its capabilities sorted by name
    pub async fn get_application(&self, id: EntityId) -> Result<ApplicationDetail> {
        let application = self
            .store
            .get_application(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {} not found", id)))?;

        let mut capabilities = Vec::new();
        for capability in self.store.list_capabilities(id).await? {
            let tags = self.store.tags_by_ids(&capability.tag_ids).await?;
            capabilities.push(CapabilityView::new(capability, tags));
        }

        Ok(ApplicationDetail {
            application: self.application_view(application).await?,
            capabilities,
        })
    }

    pub async fn update_application(
        &self,
        id: EntityId,
        changes: ApplicationChanges,
    ) -> Result<ApplicationView> {
        let mut application = self
            .store
            .get_application(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {} not found", id)))?;

        if let Some(name) = changes.name {
            application.name = validate_name(&name)?;
        }
        if changes.description.is_some() {
            application.description = clean_description(changes.description);
        }
        if let Some(tags) = changes.tags {
            application.tag_ids = self.sync_tags(&tags).await?;
        }
        application.updated_at = Utc::now();

        self.store.update_application(&application).await?;
        tracing::info!(application_id = id, "Application updated");

        self.application_view(application).await
    }

    /// Delete an application and its capabilities. Audit entries are kept.
    pub async fn delete_application(&self, id: EntityId) -> Result<()> {
        self.store.delete_application(id).await?;
        tracing::info!(application_id = id, "Application deleted");
        Ok(())
    }

    pub async fn create_capability(&self, input: NewCapability) -> Result<CapabilityView> {
        let name = validate_name(&input.name)?;

        if self.store.get_application(input.application_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Application {} not found",
                input.application_id
            )));
        }

        let tag_ids = self.sync_tags(&input.tags).await?;
        let capability = self
            .store
            .create_capability(CapabilityDraft {
                application_id: input.application_id,
                name,
                description: clean_description(input.description),
                tag_ids,
            })
            .await?;

        tracing::info!(
            capability_id = capability.id,
            application_id = capability.application_id,
            name = %capability.name,
            "Capability created"
        );

        self.capability_view(capability).await
    }

    pub async fn get_capability(&self, id: EntityId) -> Result<CapabilityView> {
        let capability = self
            .store
            .get_capability(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Capability {} not found", id)))?;
        self.capability_view(capability).await
    }

    pub async fn update_capability(
        &self,
        id: EntityId,
        changes: CapabilityChanges,
    ) -> Result<CapabilityView> {
        let mut capability = self
            .store
            .get_capability(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Capability {} not found", id)))?;

        if let Some(name) = changes.name {
            capability.name = validate_name(&name)?;
        }
        if changes.description.is_some() {
            capability.description = clean_description(changes.description);
        }
        if let Some(tags) = changes.tags {
            capability.tag_ids = self.sync_tags(&tags).await?;
        }
        capability.updated_at = Utc::now();

        self.store.update_capability(&capability).await?;
        tracing::info!(capability_id = id, "Capability updated");

        self.capability_view(capability).await
    }

    pub async fn delete_capability(&self, id: EntityId) -> Result<()> {
        self.store.delete_capability(id).await?;
        tracing::info!(capability_id = id, "Capability deleted");
        Ok(())
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.store.list_tags().await
    }

    /// Applications sorted by name, each with its capabilities sorted by name
    pub async fn tree(&self) -> Result<Vec<TreeApplication>> {
        let mut tree = Vec::new();
        for application in self.store.list_applications().await? {
            let capabilities = self
                .store
                .list_capabilities(application.id)
                .await?
                .into_iter()
                .map(TreeCapability::from)
                .collect();

            tree.push(TreeApplication {
                id: application.id,
                name: application.name,
                description: application.description,
                capabilities,
            });
        }
        Ok(tree)
    }

    /// Resolve caller-supplied tag values to ids, creating unknown ones.
    /// Values are trimmed, blanks dropped and repeats collapsed ignoring case.
    async fn sync_tags(&self, values: &[String]) -> Result<Vec<EntityId>> {
        let wanted: TagSet = values
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .collect();

        let mut ids = Vec::with_capacity(wanted.len());
        for value in wanted.into_vec() {
            let tag = self.store.get_or_create_tag(&value).await?;
            // Two inputs can differ in case yet resolve to one registry entry
            if !ids.contains(&tag.id) {
                ids.push(tag.id);
            }
        }
        Ok(ids)
    }

    async fn application_view(&self, application: Application) -> Result<ApplicationView> {
        let tags = self.store.tags_by_ids(&application.tag_ids).await?;
        Ok(ApplicationView::new(application, tags))
    }

    async fn capability_view(&self, capability: Capability) -> Result<CapabilityView> {
        let tags = self.store.tags_by_ids(&capability.tag_ids).await?;
        Ok(CapabilityView::new(capability, tags))
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryStore;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(InMemoryStore::new()))
    }

    fn new_app(name: &str, tags: &[&str]) -> NewApplication {
        NewApplication {
            name: name.to_string(),
            description: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn new_cap(application_id: EntityId, name: &str, tags: &[&str]) -> NewCapability {
        NewCapability {
            application_id,
            name: name.to_string(),
            description: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_application_sanitizes_tags() {
        let catalog = service();

        let app = catalog
            .create_application(new_app("Payments", &[" team:pay ", "", "Team:PAY", "tier:1", "  "]))
            .await
            .unwrap();

        assert_eq!(app.name, "Payments");
        assert_eq!(app.tags, vec!["team:pay", "tier:1"]);
    }

    #[tokio::test]
    async fn test_existing_tag_casing_is_reused() {
        let catalog = service();
        catalog.create_application(new_app("A", &["OnCall"])).await.unwrap();

        let other = catalog.create_application(new_app("B", &["oncall"])).await.unwrap();

        assert_eq!(other.tags, vec!["OnCall"]);
        assert_eq!(catalog.list_tags().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_name_validation() {
        let catalog = service();

        let blank = catalog.create_application(new_app("   ", &[])).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));

        let long = catalog.create_application(new_app(&"x".repeat(256), &[])).await;
        assert!(matches!(long, Err(AppError::Validation(_))));

        let max = catalog.create_application(new_app(&"x".repeat(255), &[])).await;
        assert!(max.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_application_name_conflicts() {
        let catalog = service();
        catalog.create_application(new_app("Search", &[])).await.unwrap();

        let result = catalog.create_application(new_app("Search", &[])).await;
        match result {
            Err(AppError::Conflict(message)) => {
                assert_eq!(message, "Application name already exists")
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_application_replaces_tags() {
        let catalog = service();
        let app = catalog.create_application(new_app("A", &["x", "y"])).await.unwrap();

        let updated = catalog
            .update_application(
                app.id,
                ApplicationChanges {
                    name: Some("Renamed".to_string()),
                    description: Some("Core service".to_string()),
                    tags: Some(vec!["z".to_string()]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.description.as_deref(), Some("Core service"));
        assert_eq!(updated.tags, vec!["z"]);
        assert!(updated.updated_at >= app.updated_at);

        // Omitted fields stay as they were
        let untouched = catalog
            .update_application(app.id, ApplicationChanges::default())
            .await
            .unwrap();
        assert_eq!(untouched.tags, vec!["z"]);
        assert_eq!(untouched.name, "Renamed");
    }

    #[tokio::test]
    async fn test_update_missing_application_is_not_found() {
        let catalog = service();
        let result = catalog.update_application(99, ApplicationChanges::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_capability_requires_application() {
        let catalog = service();
        let result = catalog.create_capability(new_cap(42, "Orphan", &[])).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_capability_names_unique_per_application() {
        let catalog = service();
        let a = catalog.create_application(new_app("A", &[])).await.unwrap();
        let b = catalog.create_application(new_app("B", &[])).await.unwrap();

        catalog.create_capability(new_cap(a.id, "Login", &[])).await.unwrap();
        catalog.create_capability(new_cap(b.id, "Login", &[])).await.unwrap();

        let duplicate = catalog.create_capability(new_cap(a.id, "Login", &[])).await;
        match duplicate {
            Err(AppError::Conflict(message)) => {
                assert_eq!(message, "Capability name already exists for this application")
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_application_includes_sorted_capabilities() {
        let catalog = service();
        let app = catalog.create_application(new_app("A", &["team:a"])).await.unwrap();
        catalog.create_capability(new_cap(app.id, "Zulu", &["z"])).await.unwrap();
        catalog.create_capability(new_cap(app.id, "Alpha", &[])).await.unwrap();

        let detail = catalog.get_application(app.id).await.unwrap();

        assert_eq!(detail.application.tags, vec!["team:a"]);
        let names: Vec<_> = detail.capabilities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zulu"]);
        assert_eq!(detail.capabilities[1].tags, vec!["z"]);
    }

    #[tokio::test]
    async fn test_delete_application_cascades() {
        let catalog = service();
        let app = catalog.create_application(new_app("A", &[])).await.unwrap();
        let cap = catalog.create_capability(new_cap(app.id, "C", &[])).await.unwrap();

        catalog.delete_application(app.id).await.unwrap();

        assert!(matches!(
            catalog.get_capability(cap.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(catalog.tree().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_capability() {
        let catalog = service();
        let app = catalog.create_application(new_app("A", &[])).await.unwrap();
        let cap = catalog.create_capability(new_cap(app.id, "C", &["x"])).await.unwrap();

        let updated = catalog
            .update_capability(
                cap.id,
                CapabilityChanges {
                    name: Some("Checkout".to_string()),
                    description: None,
                    tags: Some(vec![]),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Checkout");
        assert!(updated.tags.is_empty());

        catalog.delete_capability(cap.id).await.unwrap();
        assert!(matches!(
            catalog.delete_capability(cap.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tree_sorted_by_name() {
        let catalog = service();
        let search = catalog.create_application(new_app("Search", &[])).await.unwrap();
        let billing = catalog.create_application(new_app("Billing", &[])).await.unwrap();
        catalog.create_capability(new_cap(search.id, "Query", &[])).await.unwrap();
        catalog.create_capability(new_cap(search.id, "Index", &[])).await.unwrap();

        let tree = catalog.tree().await.unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, billing.id);
        assert!(tree[0].capabilities.is_empty());
        assert_eq!(tree[1].name, "Search");
        let names: Vec<_> = tree[1].capabilities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Index", "Query"]);
    }
}
