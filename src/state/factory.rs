use crate::config::{StateBackend, StateConfig};
use crate::error::{AppError, Result};
use crate::state::{BridgeStore, InMemoryStore, SledStore};
use std::sync::Arc;

/// Create a store based on configuration
pub async fn create_store(config: &StateConfig) -> Result<Arc<dyn BridgeStore>> {
    match config.backend {
        StateBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            tracing::info!(path = ?path, "Initializing Sled storage backend");

            let store = SledStore::new(path)?;
            Ok(Arc::new(store))
        }

        StateBackend::Memory => {
            tracing::warn!("In-memory backend selected; data is lost on restart");
            Ok(create_in_memory_store())
        }
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn BridgeStore> {
    tracing::info!("Initializing in-memory storage backend");
    Arc::new(InMemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_sled_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = StateConfig {
            backend: StateBackend::Sled,
            path: Some(temp_dir.path().join("db")),
        };

        let store = create_store(&config).await.unwrap();
        assert_eq!(store.count_incident_logs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_in_memory_store() {
        let config = StateConfig {
            backend: StateBackend::Memory,
            path: None,
        };

        let store = create_store(&config).await.unwrap();
        assert!(store.list_applications().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sled_requires_path() {
        let config = StateConfig {
            backend: StateBackend::Sled,
            path: None,
        };

        let result = create_store(&config).await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
