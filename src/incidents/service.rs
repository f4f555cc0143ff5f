use crate::incidents::{map_severity, IncidentGateway, TagAggregator};
use crate::metrics;
use crate::models::{EntityId, IncidentLogEntry, IncidentOutcome, Severity};
use crate::state::BridgeStore;
use std::sync::Arc;

/// Incident-creation workflow: map severity, aggregate tags, call the
/// gateway, and record confirmed incidents in the audit log.
///
/// Only incidents the external platform confirmed are logged. Gateway
/// failures come back as an error outcome and leave the log untouched.
pub struct IncidentService {
    store: Arc<dyn BridgeStore>,
    aggregator: TagAggregator,
    gateway: Arc<dyn IncidentGateway>,
}

impl IncidentService {
    pub fn new(store: Arc<dyn BridgeStore>, gateway: Arc<dyn IncidentGateway>) -> Self {
        Self {
            aggregator: TagAggregator::new(store.clone()),
            store,
            gateway,
        }
    }

    /// Get a reference to the store
    pub fn store(&self) -> &Arc<dyn BridgeStore> {
        &self.store
    }

    /// Create an incident for the selected applications and capabilities.
    ///
    /// Callers validate the title and selection beforehand; this never fails,
    /// every problem is reported through the returned outcome.
    pub async fn create_incident(
        &self,
        title: &str,
        severity: Severity,
        application_ids: &[EntityId],
        capability_ids: &[EntityId],
    ) -> IncidentOutcome {
        let grafana_severity = map_severity(severity);

        let tags = match self.aggregator.aggregate(application_ids, capability_ids).await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve tags for incident");
                metrics::record_outcome("error");
                return IncidentOutcome::error(format!("Failed to resolve tags: {}", e));
            }
        };

        tracing::info!(
            title = %title,
            severity = %severity,
            grafana_severity = %grafana_severity,
            tags = ?tags,
            "Creating incident"
        );

        let created = match self
            .gateway
            .create_incident(title, grafana_severity, &tags)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, "Failed to create incident");
                metrics::record_outcome("error");
                return IncidentOutcome::error(e.to_string());
            }
        };

        let entry = IncidentLogEntry::new(
            Some(created.incident_id.clone()),
            title.to_string(),
            severity,
            grafana_severity,
            tags,
        );

        metrics::record_outcome("ok");
        let outcome = IncidentOutcome::ok(created.incident_id, created.incident_url);

        match self.store.append_incident_log(&entry).await {
            Ok(()) => {
                metrics::AUDIT_LOG_ENTRIES_TOTAL.inc();
                outcome
            }
            Err(e) => {
                // The external incident exists; report it, flag the missing record.
                tracing::error!(
                    incident_id = ?entry.grafana_incident_id,
                    error = %e,
                    "Incident created but audit log entry could not be stored"
                );
                outcome.with_message(format!(
                    "Incident created but the audit record could not be stored: {}",
                    e
                ))
            }
        }
    }
}
