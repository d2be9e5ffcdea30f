use std::collections::HashSet;

use crate::domain::{EpisodeNumber, StreamingLink, title_slug};
use crate::entities::{prelude::*, streaming_links};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info};

use super::{UpsertCounts, now};

#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamingStats {
    pub total_links: u64,
    pub unique_anime_count: u64,
    pub sources: Vec<String>,
}

pub struct StreamingLinkRepository {
    conn: DatabaseConnection,
}

impl StreamingLinkRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: streaming_links::Model) -> StreamingLink {
        StreamingLink {
            title: model.title,
            episode_number: model.episode_number,
            episode_url: model.episode_url,
            streaming_link: model.streaming_link,
            poster_image: model.poster_image,
            range_id: model.range_id,
            strategy: model.strategy,
            source: model.source,
        }
    }

    async fn upsert_with<C: ConnectionTrait>(conn: &C, link: &StreamingLink) -> anyhow::Result<()> {
        let timestamp = now();
        let active_model = streaming_links::ActiveModel {
            title: Set(link.title.clone()),
            title_slug: Set(title_slug(&link.title)),
            episode_number: Set(link.episode_number.clone()),
            episode_url: Set(link.episode_url.clone()),
            streaming_link: Set(link.streaming_link.clone()),
            poster_image: Set(link.poster_image.clone()),
            range_id: Set(link.range_id.clone()),
            strategy: Set(link.strategy.clone()),
            source: Set(link.source.clone()),
            created_at: Set(timestamp.clone()),
            updated_at: Set(timestamp),
            ..Default::default()
        };

        StreamingLinks::insert(active_model)
            .on_conflict(
                OnConflict::column(streaming_links::Column::EpisodeUrl)
                    .update_columns([
                        streaming_links::Column::Title,
                        streaming_links::Column::TitleSlug,
                        streaming_links::Column::EpisodeNumber,
                        streaming_links::Column::StreamingLink,
                        streaming_links::Column::PosterImage,
                        streaming_links::Column::RangeId,
                        streaming_links::Column::Strategy,
                        streaming_links::Column::Source,
                        streaming_links::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    /// Write-through save of one resolved episode; a newer link replaces the stored one.
    pub async fn upsert(&self, link: &StreamingLink) -> anyhow::Result<()> {
        Self::upsert_with(&self.conn, link).await?;
        debug!(url = %link.episode_url, "Upserted streaming link");
        Ok(())
    }

    pub async fn upsert_many(&self, links: &[StreamingLink]) -> anyhow::Result<UpsertCounts> {
        if links.is_empty() {
            return Ok(UpsertCounts::default());
        }

        let urls: Vec<&str> = links.iter().map(|link| link.episode_url.as_str()).collect();
        let mut seen: HashSet<String> = StreamingLinks::find()
            .select_only()
            .column(streaming_links::Column::EpisodeUrl)
            .filter(streaming_links::Column::EpisodeUrl.is_in(urls))
            .into_tuple::<String>()
            .all(&self.conn)
            .await?
            .into_iter()
            .collect();

        let txn = self.conn.begin().await?;
        let mut counts = UpsertCounts::default();
        for link in links {
            Self::upsert_with(&txn, link).await?;
            if seen.insert(link.episode_url.clone()) {
                counts.inserted += 1;
            } else {
                counts.modified += 1;
            }
        }
        txn.commit().await?;

        Ok(counts)
    }

    /// Newest first.
    pub async fn page(&self, page: u64, limit: u64) -> anyhow::Result<(Vec<StreamingLink>, u64)> {
        let paginator = StreamingLinks::find()
            .order_by_desc(streaming_links::Column::CreatedAt)
            .order_by_desc(streaming_links::Column::Id)
            .paginate(&self.conn, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items.into_iter().map(Self::map_model).collect(), total))
    }

    /// All links of one title, in episode order.
    pub async fn by_slug(&self, slug: &str) -> anyhow::Result<Vec<StreamingLink>> {
        let mut links: Vec<StreamingLink> = StreamingLinks::find()
            .filter(streaming_links::Column::TitleSlug.eq(slug))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(Self::map_model)
            .collect();

        links.sort_by(|a, b| {
            let key = |link: &StreamingLink| {
                EpisodeNumber::parse_label(&link.episode_number).map_or(f32::MAX, |n| n.value())
            };
            key(a).total_cmp(&key(b))
        });
        Ok(links)
    }

    pub async fn remove_by_slug(&self, slug: &str) -> anyhow::Result<u64> {
        let result = StreamingLinks::delete_many()
            .filter(streaming_links::Column::TitleSlug.eq(slug))
            .exec(&self.conn)
            .await?;

        if result.rows_affected > 0 {
            info!(slug, removed = result.rows_affected, "Removed streaming links");
        }
        Ok(result.rows_affected)
    }

    pub async fn stats(&self) -> anyhow::Result<StreamingStats> {
        let total_links = StreamingLinks::find().count(&self.conn).await?;

        let unique_anime_count = StreamingLinks::find()
            .select_only()
            .column(streaming_links::Column::Title)
            .distinct()
            .into_tuple::<String>()
            .all(&self.conn)
            .await?
            .len() as u64;

        let sources = StreamingLinks::find()
            .select_only()
            .column(streaming_links::Column::Source)
            .distinct()
            .order_by_asc(streaming_links::Column::Source)
            .into_tuple::<String>()
            .all(&self.conn)
            .await?;

        Ok(StreamingStats {
            total_links,
            unique_anime_count,
            sources,
        })
    }
}
