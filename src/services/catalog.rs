use crate::{
    db::DbPool,
    entities::catalog_product::{self, Entity as CatalogProduct},
    errors::ServiceError,
};
use async_trait::async_trait;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Category tags shown before the summary is truncated.
const CATEGORY_SUMMARY_LIMIT: usize = 4;
const NOT_AVAILABLE: &str = "N/A";

/// Nutrition facts per 100 g, each optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub energy_kcal: Option<f64>,
    pub fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub sugars: Option<f64>,
    pub proteins: Option<f64>,
    pub salt: Option<f64>,
}

/// One labelled nutrition value, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionRow {
    pub label: &'static str,
    pub value: Option<f64>,
    pub unit: &'static str,
}

impl NutritionRow {
    /// Compact value (`2.5`, `12`) or `N/A`.
    pub fn display_value(&self) -> String {
        match self.value {
            Some(v) => format!("{v}"),
            None => NOT_AVAILABLE.to_string(),
        }
    }
}

impl NutritionFacts {
    pub fn rows(&self) -> Vec<NutritionRow> {
        vec![
            NutritionRow { label: "Energy", value: self.energy_kcal, unit: "kcal" },
            NutritionRow { label: "Fat", value: self.fat, unit: "g" },
            NutritionRow { label: "Saturated fat", value: self.saturated_fat, unit: "g" },
            NutritionRow { label: "Carbohydrates", value: self.carbohydrates, unit: "g" },
            NutritionRow { label: "Sugars", value: self.sugars, unit: "g" },
            NutritionRow { label: "Proteins", value: self.proteins, unit: "g" },
            NutritionRow { label: "Salt", value: self.salt, unit: "g" },
        ]
    }
}

/// Canonical product descriptor for a barcode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// The code the catalog knows the product by (may carry the fallback zero)
    pub barcode: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub pack_quantity: Option<String>,
    pub category_tags: Vec<String>,
    pub nutrition: NutritionFacts,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl CatalogEntry {
    /// `"<brand> <name> (<pack>)"` with empty parts omitted, or
    /// `"Unknown product <barcode>"` when neither brand nor name is known.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [non_blank(&self.brand), non_blank(&self.name)]
            .into_iter()
            .flatten()
            .collect();

        if parts.is_empty() {
            return format!("Unknown product {}", self.barcode);
        }

        let mut display = parts.join(" ");
        if let Some(pack) = non_blank(&self.pack_quantity) {
            display.push_str(&format!(" ({pack})"));
        }
        display
    }

    /// First four category tags joined with `, `, an ellipsis when more exist.
    pub fn category_summary(&self) -> String {
        if self.category_tags.is_empty() {
            return NOT_AVAILABLE.to_string();
        }
        let shown = self
            .category_tags
            .iter()
            .take(CATEGORY_SUMMARY_LIMIT)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if self.category_tags.len() > CATEGORY_SUMMARY_LIMIT {
            format!("{shown}…")
        } else {
            shown
        }
    }
}

impl From<catalog_product::Model> for CatalogEntry {
    fn from(model: catalog_product::Model) -> Self {
        let category_tags = model
            .categories
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            barcode: model.code,
            name: model.name,
            brand: model.brand,
            pack_quantity: model.quantity,
            category_tags,
            nutrition: NutritionFacts {
                energy_kcal: model.energy_kcal_100g,
                fat: model.fat_100g,
                saturated_fat: model.saturated_fat_100g,
                carbohydrates: model.carbs_100g,
                sugars: model.sugars_100g,
                proteins: model.proteins_100g,
                salt: model.salt_100g,
            },
        }
    }
}

/// Read-only keyed product source.
///
/// `Ok(None)` means the code is unknown; `Err` is reserved for faults.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn lookup(&self, code: &str) -> Result<Option<CatalogEntry>, ServiceError>;
}

/// Catalog backed by the `catalog_products` table.
#[derive(Clone)]
pub struct DbCatalogSource {
    db_pool: Arc<DbPool>,
}

impl DbCatalogSource {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CatalogSource for DbCatalogSource {
    async fn lookup(&self, code: &str) -> Result<Option<CatalogEntry>, ServiceError> {
        let product = CatalogProduct::find_by_id(code.to_owned())
            .one(&*self.db_pool)
            .await
            .map_err(|e| ServiceError::LookupFault(e.to_string()))?;
        Ok(product.map(CatalogEntry::from))
    }
}

/// In-memory catalog, used for seeding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: CatalogEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn insert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.barcode.clone(), entry);
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn lookup(&self, code: &str) -> Result<Option<CatalogEntry>, ServiceError> {
        Ok(self.entries.get(code).cloned())
    }
}

/// Resolves scanned barcodes against a [`CatalogSource`].
#[derive(Clone)]
pub struct CatalogResolver {
    source: Arc<dyn CatalogSource>,
    timeout: Duration,
}

impl CatalogResolver {
    pub fn new(source: Arc<dyn CatalogSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Exact lookup, then one retry with a single leading zero, which covers
    /// scanners that drop the first digit of a 13-digit code.
    #[instrument(skip(self))]
    pub async fn resolve(&self, barcode: &str) -> Result<Option<CatalogEntry>, ServiceError> {
        if let Some(entry) = self.lookup_once(barcode).await? {
            return Ok(Some(entry));
        }

        let padded = format!("0{barcode}");
        debug!(barcode, padded = %padded, "exact lookup missed, retrying with leading zero");
        self.lookup_once(&padded).await
    }

    /// Catalog descriptor for the item-details view of a stocked barcode.
    ///
    /// An unknown code is `NotFound` here, unlike [`Self::resolve`], since the
    /// item was resolved once when it was first scanned.
    #[instrument(skip(self))]
    pub async fn details(&self, barcode: &str) -> Result<CatalogEntry, ServiceError> {
        self.resolve(barcode)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no catalog entry for {barcode}")))
    }

    async fn lookup_once(&self, code: &str) -> Result<Option<CatalogEntry>, ServiceError> {
        match tokio::time::timeout(self.timeout, self.source.lookup(code)).await {
            Ok(result) => result.map_err(|e| match e {
                ServiceError::LookupFault(_) => e,
                other => ServiceError::LookupFault(other.to_string()),
            }),
            Err(_) => {
                warn!(code, timeout = ?self.timeout, "catalog lookup timed out");
                Err(ServiceError::LookupFault(format!(
                    "lookup for {code} did not answer within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use rstest::rstest;

    fn entry(barcode: &str, brand: Option<&str>, name: Option<&str>, pack: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            barcode: barcode.to_string(),
            brand: brand.map(str::to_string),
            name: name.map(str::to_string),
            pack_quantity: pack.map(str::to_string),
            ..Default::default()
        }
    }

    #[rstest]
    #[case(Some("Heinz"), Some("Baked Beans"), Some("415g"), "Heinz Baked Beans (415g)")]
    #[case(None, Some("Coca-Cola"), Some("355ml"), "Coca-Cola (355ml)")]
    #[case(Some("Barilla"), None, None, "Barilla")]
    #[case(Some(""), Some("Oats"), Some("  "), "Oats")]
    #[case(None, None, Some("1kg"), "Unknown product 123")]
    #[case(Some(" "), Some(""), None, "Unknown product 123")]
    fn display_name_joins_non_empty_parts(
        #[case] brand: Option<&str>,
        #[case] name: Option<&str>,
        #[case] pack: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(entry("123", brand, name, pack).display_name(), expected);
    }

    #[test]
    fn category_summary_truncates_after_four() {
        let mut e = entry("1", None, Some("x"), None);
        assert_eq!(e.category_summary(), "N/A");

        e.category_tags = vec!["Drinks".into(), "Sodas".into()];
        assert_eq!(e.category_summary(), "Drinks, Sodas");

        e.category_tags = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        assert_eq!(e.category_summary(), "a, b, c, d…");
    }

    #[test]
    fn model_conversion_splits_categories_and_maps_nutrition() {
        let model = catalog_product::Model {
            code: "5000112637922".into(),
            name: Some("Diet Coke".into()),
            brand: Some("Coca-Cola".into()),
            quantity: Some("330ml".into()),
            categories: Some("Beverages, Sodas,, Diet sodas ".into()),
            energy_kcal_100g: Some(0.4),
            fat_100g: None,
            saturated_fat_100g: None,
            carbs_100g: Some(0.0),
            sugars_100g: Some(0.0),
            proteins_100g: None,
            salt_100g: Some(0.02),
        };
        let e = CatalogEntry::from(model);
        assert_eq!(e.category_tags, vec!["Beverages", "Sodas", "Diet sodas"]);
        assert_eq!(e.nutrition.energy_kcal, Some(0.4));
        assert_eq!(e.nutrition.salt, Some(0.02));

        let rows = e.nutrition.rows();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].display_value(), "0.4");
        assert_eq!(rows[1].display_value(), "N/A");
        assert_eq!(rows[3].display_value(), "0");
    }

    #[tokio::test]
    async fn resolve_prefers_exact_match() {
        let mut source = MockCatalogSource::new();
        source
            .expect_lookup()
            .with(eq("49000028911"))
            .times(1)
            .returning(|code| Ok(Some(entry(code, None, Some("Exact"), None))));

        let resolver = CatalogResolver::new(Arc::new(source), Duration::from_secs(1));
        let found = resolver.resolve("49000028911").await.unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("Exact"));
    }

    #[tokio::test]
    async fn resolve_retries_once_with_leading_zero() {
        let mut source = MockCatalogSource::new();
        source
            .expect_lookup()
            .with(eq("49000028911"))
            .times(1)
            .returning(|_| Ok(None));
        source
            .expect_lookup()
            .with(eq("049000028911"))
            .times(1)
            .returning(|code| Ok(Some(entry(code, None, Some("Coca-Cola"), Some("355ml")))));

        let resolver = CatalogResolver::new(Arc::new(source), Duration::from_secs(1));
        let found = resolver.resolve("49000028911").await.unwrap().unwrap();
        assert_eq!(found.barcode, "049000028911");
        assert_eq!(found.display_name(), "Coca-Cola (355ml)");
    }

    #[tokio::test]
    async fn resolve_reports_not_found_after_two_misses() {
        let mut source = MockCatalogSource::new();
        source.expect_lookup().times(2).returning(|_| Ok(None));

        let resolver = CatalogResolver::new(Arc::new(source), Duration::from_secs(1));
        assert_eq!(resolver.resolve("000111").await.unwrap(), None);
    }

    #[tokio::test]
    async fn resolve_surfaces_faults_without_retrying() {
        let mut source = MockCatalogSource::new();
        source
            .expect_lookup()
            .times(1)
            .returning(|_| Err(ServiceError::db_error("connection reset")));

        let resolver = CatalogResolver::new(Arc::new(source), Duration::from_secs(1));
        let err = resolver.resolve("123").await.unwrap_err();
        assert!(matches!(err, ServiceError::LookupFault(_)));
        assert!(err.is_retryable());
    }

    struct StalledCatalog;

    #[async_trait]
    impl CatalogSource for StalledCatalog {
        async fn lookup(&self, _code: &str) -> Result<Option<CatalogEntry>, ServiceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn resolve_times_out_as_lookup_fault() {
        let resolver = CatalogResolver::new(Arc::new(StalledCatalog), Duration::from_millis(50));
        let err = resolver.resolve("123").await.unwrap_err();
        assert!(matches!(err, ServiceError::LookupFault(msg) if msg.contains("did not answer")));
    }

    #[tokio::test]
    async fn details_reports_missing_entries_as_not_found() {
        let catalog = StaticCatalog::new().with_entry(entry("042", Some("Twinings"), Some("Tea"), None));
        let resolver = CatalogResolver::new(Arc::new(catalog), Duration::from_secs(1));

        assert_eq!(resolver.details("42").await.unwrap().display_name(), "Twinings Tea");
        assert!(matches!(
            resolver.details("999").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn static_catalog_is_keyed_by_code() {
        let catalog = StaticCatalog::new().with_entry(entry("42", None, Some("Tea"), None));
        assert!(catalog.lookup("42").await.unwrap().is_some());
        assert!(catalog.lookup("042").await.unwrap().is_none());
    }
}
