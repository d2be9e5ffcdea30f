use std::collections::{BTreeMap, HashSet};

use crate::domain::{AnimeMetadata, AnimeRecord, AnimeSummary, AudioType, Category};
use crate::entities::{anime, prelude::*};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::debug;

use super::{UpsertCounts, now};

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnimeStats {
    pub total: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_audio_type: BTreeMap<String, u64>,
}

pub struct AnimeRepository {
    conn: DatabaseConnection,
}

impl AnimeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: anime::Model) -> AnimeRecord {
        AnimeRecord {
            summary: AnimeSummary {
                position: u32::try_from(model.position).unwrap_or_default(),
                title: model.title,
                detail_url: model.detail_url,
                poster_image: model.poster_image,
                episodes_label: model.episodes_label,
                audio_type: AudioType::parse(&model.audio_type),
            },
            metadata: AnimeMetadata {
                kind: model.kind,
                genres: model
                    .genres
                    .and_then(|s| serde_json::from_str(&s).ok())
                    .unwrap_or_default(),
                country: model.country,
                status: model.status,
                released: model.released,
                description: model.description,
            },
            source: model.source,
            category: Category::parse(&model.category),
            rank: model.rank.and_then(|r| u32::try_from(r).ok()),
            chart_title: model.chart_title,
        }
    }

    fn active_model(record: &AnimeRecord, timestamp: &str) -> anime::ActiveModel {
        let summary = &record.summary;
        let metadata = &record.metadata;

        anime::ActiveModel {
            position: Set(i32::try_from(summary.position).unwrap_or(i32::MAX)),
            title: Set(summary.title.clone()),
            detail_url: Set(summary.detail_url.clone()),
            episodes_label: Set(summary.episodes_label.clone()),
            poster_image: Set(summary.poster_image.clone()),
            audio_type: Set(summary.audio_type.as_str().to_string()),
            kind: Set(metadata.kind.clone()),
            genres: Set((!metadata.genres.is_empty())
                .then(|| serde_json::to_string(&metadata.genres).ok())
                .flatten()),
            country: Set(metadata.country.clone()),
            status: Set(metadata.status.clone()),
            released: Set(metadata.released.clone()),
            description: Set(metadata.description.clone()),
            source: Set(record.source.clone()),
            category: Set(record.category.as_str().to_string()),
            rank: Set(record.rank.and_then(|r| i32::try_from(r).ok())),
            chart_title: Set(record.chart_title.clone()),
            created_at: Set(timestamp.to_string()),
            updated_at: Set(timestamp.to_string()),
            ..Default::default()
        }
    }

    /// Insert, or overwrite every scraped column of the row with the same detail URL.
    async fn upsert_with<C: ConnectionTrait>(conn: &C, record: &AnimeRecord) -> anyhow::Result<()> {
        Anime::insert(Self::active_model(record, &now()))
            .on_conflict(
                OnConflict::column(anime::Column::DetailUrl)
                    .update_columns([
                        anime::Column::Position,
                        anime::Column::Title,
                        anime::Column::EpisodesLabel,
                        anime::Column::PosterImage,
                        anime::Column::AudioType,
                        anime::Column::Kind,
                        anime::Column::Genres,
                        anime::Column::Country,
                        anime::Column::Status,
                        anime::Column::Released,
                        anime::Column::Description,
                        anime::Column::Source,
                        anime::Column::Category,
                        anime::Column::Rank,
                        anime::Column::ChartTitle,
                        anime::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    /// Upserts all records in one transaction. Later duplicates in `records` win.
    pub async fn upsert_many(&self, records: &[AnimeRecord]) -> anyhow::Result<UpsertCounts> {
        if records.is_empty() {
            return Ok(UpsertCounts::default());
        }

        let urls: Vec<&str> = records
            .iter()
            .map(|record| record.summary.detail_url.as_str())
            .collect();
        let mut seen: HashSet<String> = Anime::find()
            .select_only()
            .column(anime::Column::DetailUrl)
            .filter(anime::Column::DetailUrl.is_in(urls))
            .into_tuple::<String>()
            .all(&self.conn)
            .await?
            .into_iter()
            .collect();

        let txn = self.conn.begin().await?;
        let mut counts = UpsertCounts::default();
        for record in records {
            Self::upsert_with(&txn, record).await?;
            if seen.insert(record.summary.detail_url.clone()) {
                counts.inserted += 1;
            } else {
                counts.modified += 1;
            }
        }
        txn.commit().await?;

        debug!(
            inserted = counts.inserted,
            modified = counts.modified,
            "Bulk upserted anime"
        );
        Ok(counts)
    }

    pub async fn get_by_url(&self, detail_url: &str) -> anyhow::Result<Option<AnimeRecord>> {
        let model = Anime::find()
            .filter(anime::Column::DetailUrl.eq(detail_url))
            .one(&self.conn)
            .await?;
        Ok(model.map(Self::map_model))
    }

    /// One page of the stored catalog, most recently updated first, plus the total row count.
    pub async fn page(&self, page: u64, limit: u64) -> anyhow::Result<(Vec<AnimeRecord>, u64)> {
        let paginator = Anime::find()
            .order_by_desc(anime::Column::UpdatedAt)
            .order_by_desc(anime::Column::Id)
            .paginate(&self.conn, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items.into_iter().map(Self::map_model).collect(), total))
    }

    /// Rows in insertion order starting at `offset`.
    pub async fn slice(&self, offset: u64, limit: u64) -> anyhow::Result<Vec<AnimeRecord>> {
        let rows = Anime::find()
            .order_by_asc(anime::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn search(&self, query: &str, limit: u64) -> anyhow::Result<Vec<AnimeRecord>> {
        let rows = Anime::find()
            .filter(anime::Column::Title.contains(query.trim()))
            .order_by_asc(anime::Column::Title)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    /// A ranked list in rank order.
    pub async fn ranked(&self, category: Category) -> anyhow::Result<Vec<AnimeRecord>> {
        let rows = Anime::find()
            .filter(anime::Column::Category.eq(category.as_str()))
            .filter(anime::Column::Rank.is_not_null())
            .order_by_asc(anime::Column::Rank)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn count(&self) -> anyhow::Result<u64> {
        Ok(Anime::find().count(&self.conn).await?)
    }

    pub async fn stats(&self) -> anyhow::Result<AnimeStats> {
        let total = self.count().await?;
        let by_category = self.grouped_counts(anime::Column::Category).await?;
        let by_audio_type = self.grouped_counts(anime::Column::AudioType).await?;

        Ok(AnimeStats {
            total,
            by_category,
            by_audio_type,
        })
    }

    async fn grouped_counts(&self, column: anime::Column) -> anyhow::Result<BTreeMap<String, u64>> {
        let rows = Anime::find()
            .select_only()
            .column(column)
            .column_as(anime::Column::Id.count(), "count")
            .group_by(column)
            .into_tuple::<(String, i64)>()
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(key, count)| (key, u64::try_from(count).unwrap_or_default()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn record(title: &str, slug: &str, category: Category) -> AnimeRecord {
        let mut record = AnimeRecord::new(
            AnimeSummary {
                position: 1,
                title: title.to_string(),
                detail_url: format!("https://w1.123animes.ru/anime/{slug}"),
                poster_image: None,
                episodes_label: Some("12".to_string()),
                audio_type: AudioType::Sub,
            },
            AnimeMetadata {
                genres: vec!["Action".to_string(), "Drama".to_string()],
                ..AnimeMetadata::default()
            },
            "123animes",
        );
        record.category = category;
        record
    }

    async fn repo() -> AnimeRepository {
        let store = Store::new("sqlite::memory:").await.unwrap();
        AnimeRepository::new(store.conn)
    }

    #[tokio::test]
    async fn test_upsert_many_counts_and_overwrites() {
        let repo = repo().await;

        let counts = repo
            .upsert_many(&[
                record("Monster", "monster", Category::General),
                record("Mushishi", "mushishi", Category::General),
            ])
            .await
            .unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 2, modified: 0 });

        let mut renamed = record("Monster (2004)", "monster", Category::General);
        renamed.metadata.country = Some("Japan".to_string());
        let counts = repo
            .upsert_many(&[renamed, record("Bleach", "bleach", Category::General)])
            .await
            .unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 1, modified: 1 });
        assert_eq!(repo.count().await.unwrap(), 3);

        let stored = repo
            .get_by_url("https://w1.123animes.ru/anime/monster")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.summary.title, "Monster (2004)");
        assert_eq!(stored.metadata.country.as_deref(), Some("Japan"));
        assert_eq!(stored.metadata.genres, vec!["Action", "Drama"]);
    }

    #[tokio::test]
    async fn test_page_search_and_stats() {
        let repo = repo().await;
        let mut top = record("Frieren", "frieren", Category::Trending);
        top.rank = Some(1);
        repo.upsert_many(&[top, record("Monster", "monster", Category::General)])
            .await
            .unwrap();

        let (items, total) = repo.page(1, 1).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(total, 2);

        let found = repo.search("frier", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, Category::Trending);

        let ranked = repo.ranked(Category::Trending).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rank, Some(1));

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_category.get("trending"), Some(&1));
        assert_eq!(stats.by_audio_type.get("SUB"), Some(&2));

        let slice = repo.slice(1, 5).await.unwrap();
        assert_eq!(slice.len(), 1);
        assert_eq!(slice[0].summary.title, "Monster");
    }
}
