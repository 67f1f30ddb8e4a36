pub mod domain;
pub mod store;
pub mod vault;

pub use domain::{OrderRecord, OrderStats, ProductSummary, WarehouseRecord};
pub use store::WorkflowStore;
pub use vault::Vault;
