use crate::error::Result;
use crate::models::{EntityId, Tag};
use crate::state::BridgeStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Insertion-ordered set of tag values, deduplicated case-insensitively.
/// The first casing seen for a value is the one kept.
#[derive(Debug, Default, Clone)]
pub struct TagSet {
    seen: HashSet<String>,
    values: Vec<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; returns false when an equal value (ignoring case) is already present
    pub fn insert(&mut self, value: &str) -> bool {
        if self.seen.insert(Tag::normalize(value)) {
            self.values.push(value.to_string());
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.values
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// Collects the tags of a selection of applications and capabilities.
///
/// Applications are visited before capabilities, each group in ascending id
/// order, and each entity's tags in association order.
pub struct TagAggregator {
    store: Arc<dyn BridgeStore>,
}

impl TagAggregator {
    pub fn new(store: Arc<dyn BridgeStore>) -> Self {
        Self { store }
    }

    pub async fn aggregate(
        &self,
        application_ids: &[EntityId],
        capability_ids: &[EntityId],
    ) -> Result<Vec<String>> {
        let mut tags = TagSet::new();

        if !application_ids.is_empty() {
            for application in self.store.applications_by_ids(application_ids).await? {
                for tag in self.store.tags_by_ids(&application.tag_ids).await? {
                    tags.insert(&tag.value);
                }
            }
        }

        if !capability_ids.is_empty() {
            for capability in self.store.capabilities_by_ids(capability_ids).await? {
                for tag in self.store.tags_by_ids(&capability.tag_ids).await? {
                    tags.insert(&tag.value);
                }
            }
        }

        tracing::debug!(
            applications = application_ids.len(),
            capabilities = capability_ids.len(),
            tags = tags.len(),
            "Aggregated tags"
        );

        Ok(tags.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationDraft, CapabilityDraft};
    use crate::state::InMemoryStore;

    async fn tag_ids(store: &InMemoryStore, values: &[&str]) -> Vec<EntityId> {
        let mut ids = Vec::new();
        for value in values {
            ids.push(store.get_or_create_tag(value).await.unwrap().id);
        }
        ids
    }

    async fn application(store: &InMemoryStore, name: &str, tags: &[&str]) -> EntityId {
        let tag_ids = tag_ids(store, tags).await;
        store
            .create_application(ApplicationDraft {
                name: name.to_string(),
                description: None,
                tag_ids,
            })
            .await
            .unwrap()
            .id
    }

    async fn capability(
        store: &InMemoryStore,
        application_id: EntityId,
        name: &str,
        tags: &[&str],
    ) -> EntityId {
        let tag_ids = tag_ids(store, tags).await;
        store
            .create_capability(CapabilityDraft {
                application_id,
                name: name.to_string(),
                description: None,
                tag_ids,
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_tag_set_keeps_first_casing() {
        let set: TagSet = ["Foo", "bar", "foo", "FOO", "Bar"].into_iter().collect();
        assert_eq!(set.into_vec(), vec!["Foo".to_string(), "bar".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_selection_yields_no_tags() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = TagAggregator::new(store);

        assert!(aggregator.aggregate(&[], &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_application_tags_precede_capability_tags() {
        let store = InMemoryStore::new();
        let app = application(&store, "Payments", &["team:payments"]).await;
        let other = application(&store, "Search", &[]).await;
        let cap = capability(&store, other, "Indexing", &["oncall", "tier:1"]).await;

        let aggregator = TagAggregator::new(Arc::new(store));
        let tags = aggregator.aggregate(&[app], &[cap]).await.unwrap();

        assert_eq!(tags, vec!["team:payments", "oncall", "tier:1"]);
    }

    #[tokio::test]
    async fn test_first_seen_casing_wins_across_entities() {
        let store = InMemoryStore::new();
        // "Foo" is registered first, so the registry keeps that casing.
        let app = application(&store, "A", &["Foo"]).await;
        let cap = capability(&store, app, "C", &["foo", "extra"]).await;

        let aggregator = TagAggregator::new(Arc::new(store));
        let tags = aggregator.aggregate(&[app], &[cap]).await.unwrap();

        assert_eq!(tags, vec!["Foo", "extra"]);
    }

    #[tokio::test]
    async fn test_applications_visited_in_ascending_id_order() {
        let store = InMemoryStore::new();
        let first = application(&store, "Zeta", &["zeta"]).await;
        let second = application(&store, "Alpha", &["alpha"]).await;

        let aggregator = TagAggregator::new(Arc::new(store));
        let tags = aggregator.aggregate(&[second, first], &[]).await.unwrap();

        assert_eq!(tags, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_aggregate_is_repeatable() {
        let store = InMemoryStore::new();
        let app = application(&store, "A", &["x", "y"]).await;
        let cap = capability(&store, app, "C", &["Y", "z"]).await;

        let aggregator = TagAggregator::new(Arc::new(store));
        let once = aggregator.aggregate(&[app], &[cap]).await.unwrap();
        let twice = aggregator.aggregate(&[app], &[cap]).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(once, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_skipped() {
        let store = InMemoryStore::new();
        let app = application(&store, "A", &["x"]).await;

        let aggregator = TagAggregator::new(Arc::new(store));
        let tags = aggregator.aggregate(&[app, 404], &[405]).await.unwrap();

        assert_eq!(tags, vec!["x"]);
    }
}
