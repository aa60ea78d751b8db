use crate::entities::{chapters, novels, prelude::*};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Novels)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Sources)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Chapters)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chapters_novel_num")
                    .table(Chapters)
                    .col(chapters::Column::NovelId)
                    .col(chapters::Column::ChapterNum)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Listing sorts
        for (name, column) in [
            ("idx_novels_year_start", novels::Column::YearStart),
            ("idx_novels_chapters_count", novels::Column::ChaptersCount),
            ("idx_novels_title", novels::Column::Title),
            ("idx_novels_created_at", novels::Column::CreatedAt),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Novels)
                        .col(column)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Chapters).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sources).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Novels).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
