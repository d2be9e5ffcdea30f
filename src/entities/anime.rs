use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "anime")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub position: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub detail_url: String,
    pub episodes_label: Option<String>,
    pub poster_image: Option<String>,
    pub audio_type: String,
    pub kind: Option<String>,
    /// JSON array of genre names.
    pub genres: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
    pub released: Option<String>,
    pub description: Option<String>,
    pub source: String,
    pub category: String,
    pub rank: Option<i32>,
    pub chart_title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
