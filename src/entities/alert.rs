use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub service_id: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub priority: Option<String>,
    /// GeoJSON point, longitude before latitude.
    pub location: Json,
    pub address: Option<String>,
    pub is_anonymous: bool,
    pub citizen_id: Option<String>,
    /// Ordered proof records, submission order preserved.
    #[sea_orm(column_type = "JsonBinary")]
    pub proofs: Json,
    pub status: String,
    /// Append-only comment records, including webhook transition notes.
    #[sea_orm(column_type = "JsonBinary")]
    pub comments: Json,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
