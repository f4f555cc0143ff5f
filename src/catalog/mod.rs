pub mod service;
pub mod views;

pub use service::CatalogService;
pub use views::*;
