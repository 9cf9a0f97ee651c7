//! Household services: catalog resolution, pantry inventory, storage locations and chores.

pub mod catalog;
pub mod chores;
pub mod inventory;
pub mod locations;

pub use catalog::{CatalogEntry, CatalogResolver, CatalogSource, DbCatalogSource, StaticCatalog};
pub use chores::ChoreService;
pub use inventory::InventoryService;
pub use locations::LocationService;
