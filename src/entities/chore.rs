use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chores")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub chore_id: i32,
    pub description: String,
    pub person_id: Option<i32>,
    pub frequency: String,
    /// 1-based position in the chore list; always dense
    pub display_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
