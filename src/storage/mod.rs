pub mod db;
pub mod models;
pub mod store;

pub use db::{Database, DatabaseStats};
pub use models::{ProviderRole, ProviderStats, TriggerSource};
pub use store::ProviderStore;
