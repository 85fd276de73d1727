use sea_orm_migration::prelude::*;

use crate::m20251001_000001_urls_table::Urls;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_urls_last_visited_at")
                    .table(Urls::Table)
                    .col(Urls::LastVisitedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_urls_last_visited_at").to_owned())
            .await
    }
}
