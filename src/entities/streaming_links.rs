use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "streaming_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    /// Lowercased, hyphenated title used for grouping and bulk removal.
    pub title_slug: String,
    pub episode_number: String,
    #[sea_orm(unique)]
    pub episode_url: String,
    pub streaming_link: String,
    pub poster_image: Option<String>,
    pub range_id: Option<String>,
    pub strategy: Option<String>,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
