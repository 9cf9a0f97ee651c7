//! Hearth household core
//!
//! Barcode-driven pantry inventory with storage locations, plus the chore list,
//! persisted through sea-orm on SQLite or Postgres.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod scanner;
pub mod services;
pub mod view;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    CatalogResolver, CatalogSource, ChoreService, DbCatalogSource, InventoryService,
    LocationService,
};

pub use errors::ServiceError;

/// Services wired against one household store.
#[derive(Clone)]
pub struct Household {
    pub db: Arc<DbPool>,
    pub inventory: InventoryService,
    pub locations: LocationService,
    pub chores: ChoreService,
}

impl Household {
    /// Wires services over `db`, resolving barcodes through `catalog`.
    pub fn new(
        db: Arc<DbPool>,
        catalog: Arc<dyn CatalogSource>,
        config: &AppConfig,
        event_sender: Option<EventSender>,
    ) -> Self {
        let resolver = CatalogResolver::new(catalog, config.catalog_timeout());
        let mut inventory = InventoryService::new(db.clone(), resolver);
        let mut locations = LocationService::new(db.clone());
        let mut chores = ChoreService::new(db.clone());

        if let Some(sender) = event_sender {
            inventory = inventory.with_events(sender.clone());
            locations = locations.with_events(sender.clone());
            chores = chores.with_events(sender);
        }

        Self {
            db,
            inventory,
            locations,
            chores,
        }
    }

    /// Wires services with the catalog read from `catalog_db`.
    pub fn with_db_catalog(
        db: Arc<DbPool>,
        catalog_db: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self::new(db, Arc::new(DbCatalogSource::new(catalog_db)), config, event_sender)
    }

    pub fn scan_processor(&self) -> scanner::ScanProcessor {
        scanner::ScanProcessor::new(self.inventory.clone())
    }
}
