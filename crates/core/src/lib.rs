pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod time;

pub use catalog::{Catalog, ChartPreset};
pub use error::{DcvstatError, Result};
