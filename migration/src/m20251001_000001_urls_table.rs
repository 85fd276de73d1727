use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 urls 表，id 自增且永不复用
        manager
            .create_table(
                Table::create()
                    .table(Urls::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Urls::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Urls::LongUrl).string_len(2048).not_null())
                    .col(
                        ColumnDef::new(Urls::ClickCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Urls::LastVisitedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // long_url 唯一索引：并发 shorten 收敛到同一 id 的唯一依据
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_urls_long_url")
                    .table(Urls::Table)
                    .col(Urls::LongUrl)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_urls_long_url").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Urls::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Urls {
    Table,
    Id,
    LongUrl,
    ClickCount,
    LastVisitedAt,
}
