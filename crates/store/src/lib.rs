pub mod db;
pub mod extract;
pub mod query;
pub mod reload;

pub use db::{Snapshot, Store};
pub use extract::{Extractor, LineRejection};
