use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pantry_item::Entity")]
    PantryItems,
}

impl Related<super::pantry_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PantryItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
