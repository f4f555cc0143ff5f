pub mod catalog;
pub mod incident;

pub use catalog::*;
pub use incident::*;
