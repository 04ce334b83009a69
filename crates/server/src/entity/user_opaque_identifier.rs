//! User Opaque Identifier entity - the pairwise subject for a (sector, username) pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_opaque_identifier")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Service the identifier was issued for (always "openid" today)
    pub service: String,
    pub sector_id: String,
    pub username: String,
    #[sea_orm(unique)]
    pub identifier: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
