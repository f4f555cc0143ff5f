pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::{catalog::CatalogService, incidents::IncidentService};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub incidents: Arc<IncidentService>,
    pub app_name: String,
}

impl AppState {
    pub fn new(catalog: Arc<CatalogService>, incidents: Arc<IncidentService>) -> Self {
        Self {
            catalog,
            incidents,
            app_name: "Incident Bridge".to_string(),
        }
    }

    /// Set the name reported by the health endpoint
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}
