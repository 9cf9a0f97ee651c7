use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Read-only product metadata keyed by barcode (`code`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    /// Pack size as printed, e.g. `355ml`
    pub quantity: Option<String>,
    /// Comma separated category tags
    #[sea_orm(column_type = "Text", nullable)]
    pub categories: Option<String>,
    #[sea_orm(column_name = "energy_kcal_100g")]
    pub energy_kcal_100g: Option<f64>,
    #[sea_orm(column_name = "fat_100g")]
    pub fat_100g: Option<f64>,
    #[sea_orm(column_name = "saturated_fat_100g")]
    pub saturated_fat_100g: Option<f64>,
    #[sea_orm(column_name = "carbs_100g")]
    pub carbs_100g: Option<f64>,
    #[sea_orm(column_name = "sugars_100g")]
    pub sugars_100g: Option<f64>,
    #[sea_orm(column_name = "proteins_100g")]
    pub proteins_100g: Option<f64>,
    #[sea_orm(column_name = "salt_100g")]
    pub salt_100g: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
