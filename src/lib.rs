//! Incident Bridge: raises Grafana IRM incidents for applications and
//! capabilities picked from a tree, labelled with their aggregated tags.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod incidents;
pub mod metrics;
pub mod models;
pub mod state;

pub use error::{AppError, Result};
