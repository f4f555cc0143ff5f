pub mod gateway;
pub mod service;
pub mod severity;
pub mod tags;

pub use gateway::{CreatedIncident, GatewayError, GrafanaIrmClient, IncidentGateway, Label};
pub use service::IncidentService;
pub use severity::map_severity;
pub use tags::{TagAggregator, TagSet};
