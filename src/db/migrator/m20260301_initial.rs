use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Anime::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Anime::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Anime::Position).integer().not_null().default(0))
                    .col(ColumnDef::new(Anime::Title).string().not_null())
                    .col(
                        ColumnDef::new(Anime::DetailUrl)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Anime::EpisodesLabel).string().null())
                    .col(ColumnDef::new(Anime::PosterImage).string().null())
                    .col(
                        ColumnDef::new(Anime::AudioType)
                            .string()
                            .not_null()
                            .default("unknown"),
                    )
                    .col(ColumnDef::new(Anime::Kind).string().null())
                    .col(ColumnDef::new(Anime::Genres).text().null())
                    .col(ColumnDef::new(Anime::Country).string().null())
                    .col(ColumnDef::new(Anime::Status).string().null())
                    .col(ColumnDef::new(Anime::Released).string().null())
                    .col(ColumnDef::new(Anime::Description).text().null())
                    .col(ColumnDef::new(Anime::Source).string().not_null())
                    .col(
                        ColumnDef::new(Anime::Category)
                            .string()
                            .not_null()
                            .default("general"),
                    )
                    .col(ColumnDef::new(Anime::Rank).integer().null())
                    .col(ColumnDef::new(Anime::ChartTitle).string().null())
                    .col(
                        ColumnDef::new(Anime::CreatedAt)
                            .date_time()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_owned()),
                    )
                    .col(
                        ColumnDef::new(Anime::UpdatedAt)
                            .date_time()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_owned()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_anime_category_rank")
                    .table(Anime::Table)
                    .col(Anime::Category)
                    .col(Anime::Rank)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StreamingLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StreamingLinks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StreamingLinks::Title).string().not_null())
                    .col(ColumnDef::new(StreamingLinks::TitleSlug).string().not_null())
                    .col(
                        ColumnDef::new(StreamingLinks::EpisodeNumber)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StreamingLinks::EpisodeUrl)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(StreamingLinks::StreamingLink)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StreamingLinks::PosterImage).string().null())
                    .col(ColumnDef::new(StreamingLinks::RangeId).string().null())
                    .col(ColumnDef::new(StreamingLinks::Strategy).string().null())
                    .col(ColumnDef::new(StreamingLinks::Source).string().not_null())
                    .col(
                        ColumnDef::new(StreamingLinks::CreatedAt)
                            .date_time()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_owned()),
                    )
                    .col(
                        ColumnDef::new(StreamingLinks::UpdatedAt)
                            .date_time()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_owned()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_streaming_links_title_slug")
                    .table(StreamingLinks::Table)
                    .col(StreamingLinks::TitleSlug)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StreamingLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Anime::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Anime {
    Table,
    Id,
    Position,
    Title,
    DetailUrl,
    EpisodesLabel,
    PosterImage,
    AudioType,
    Kind,
    Genres,
    Country,
    Status,
    Released,
    Description,
    Source,
    Category,
    Rank,
    ChartTitle,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StreamingLinks {
    Table,
    Id,
    Title,
    TitleSlug,
    EpisodeNumber,
    EpisodeUrl,
    StreamingLink,
    PosterImage,
    RangeId,
    Strategy,
    Source,
    CreatedAt,
    UpdatedAt,
}
