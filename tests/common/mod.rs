#![allow(dead_code)]

use std::sync::Arc;

use hearth::{
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    events::{Event, EventSender},
    services::{catalog::NutritionFacts, CatalogEntry, CatalogSource, StaticCatalog},
    Household,
};
use tokio::sync::mpsc;

pub const COCA_COLA: &str = "049000028911";
/// Coca-Cola as a scanner that drops the leading zero reports it.
pub const COCA_COLA_SHORT: &str = "49000028911";
pub const NUTELLA: &str = "3017620422003";
pub const OATS: &str = "5000168001142";
pub const UNKNOWN: &str = "000111";

pub fn coca_cola() -> CatalogEntry {
    CatalogEntry {
        barcode: COCA_COLA.to_string(),
        name: Some("Coca-Cola".to_string()),
        brand: None,
        pack_quantity: Some("355ml".to_string()),
        category_tags: vec!["Beverages".into(), "Sodas".into()],
        nutrition: NutritionFacts {
            energy_kcal: Some(42.0),
            carbohydrates: Some(10.6),
            sugars: Some(10.6),
            ..Default::default()
        },
    }
}

pub fn test_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_entry(coca_cola())
        .with_entry(CatalogEntry {
            barcode: NUTELLA.to_string(),
            name: Some("Nutella".to_string()),
            brand: Some("Ferrero".to_string()),
            pack_quantity: Some("400g".to_string()),
            ..Default::default()
        })
        .with_entry(CatalogEntry {
            barcode: OATS.to_string(),
            name: Some("porridge oats".to_string()),
            brand: Some("Quaker".to_string()),
            ..Default::default()
        })
}

/// A fresh, migrated in-memory store.
pub async fn memory_pool() -> Arc<DbPool> {
    let pool = db::establish_connection_with_config(&DbConfig::single("sqlite::memory:"))
        .await
        .expect("in-memory sqlite");
    db::run_migrations(&pool).await.expect("migrations");
    Arc::new(pool)
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
    cfg.catalog_timeout_ms = 1_000;
    cfg
}

/// Household services over an in-memory store, with the refresh stream exposed.
pub struct TestHousehold {
    pub household: Household,
    pub events: mpsc::Receiver<Event>,
}

impl TestHousehold {
    pub async fn new() -> Self {
        Self::with_catalog(Arc::new(test_catalog())).await
    }

    pub async fn with_catalog(catalog: Arc<dyn CatalogSource>) -> Self {
        let pool = memory_pool().await;
        let (sender, events) = EventSender::channel(1_024);
        let household = Household::new(pool, catalog, &test_config(), Some(sender));
        Self { household, events }
    }

    /// Events published so far, without waiting for more.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub async fn quantity_of(&self, barcode: &str) -> Option<i32> {
        self.household
            .inventory
            .get_item(barcode)
            .await
            .expect("get_item")
            .map(|item| item.quantity)
    }
}
