//! `UrlStore` implementation for SeaOrmStorage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use tracing::{debug, info};

use super::SeaOrmStorage;
use super::retry;
use crate::errors::{Result, SnaplinkError};
use crate::storage::{InsertOutcome, UrlPageEntry, UrlStats, UrlStore};

use migration::entities::url_record;

/// u64 → 数据库 id；超过 i64 的 id 不可能存在于表中
fn to_db_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

fn from_db_id(id: i64) -> Result<u64> {
    u64::try_from(id)
        .map_err(|_| SnaplinkError::storage_unavailable(format!("negative id in urls table: {}", id)))
}

#[async_trait]
impl UrlStore for SeaOrmStorage {
    async fn insert_if_absent(&self, long_url: &str) -> Result<InsertOutcome> {
        let db = &self.db;

        // 唯一索引决定胜负：冲突时什么都不做，再统一按 long_url 查 id
        // 超时的插入可能已经提交，重试会落到 DO NOTHING 而误报 created = false
        let config = self.retry_config.without_timeout_retry();
        let inserted = retry::with_retry("insert_if_absent", config, || async {
            let model = url_record::ActiveModel {
                long_url: Set(long_url.to_owned()),
                click_count: Set(0),
                last_visited_at: Set(None),
                ..Default::default()
            };
            url_record::Entity::insert(model)
                .on_conflict(
                    OnConflict::column(url_record::Column::LongUrl)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await
        })
        .await?;

        let id = self.find_id_by_url(long_url).await?.ok_or_else(|| {
            SnaplinkError::storage_unavailable(format!(
                "row for url vanished after insert: {}",
                long_url
            ))
        })?;

        let created = inserted > 0;
        if created {
            info!("URL stored: id={}", id);
        } else {
            debug!("URL already stored: id={}", id);
        }
        Ok(InsertOutcome { id, created })
    }

    async fn find_id_by_url(&self, long_url: &str) -> Result<Option<u64>> {
        let db = &self.db;
        let id = retry::with_retry("find_id_by_url", self.retry_config, || async {
            url_record::Entity::find()
                .select_only()
                .column(url_record::Column::Id)
                .filter(url_record::Column::LongUrl.eq(long_url))
                .into_tuple::<i64>()
                .one(db)
                .await
        })
        .await?;

        id.map(from_db_id).transpose()
    }

    async fn find_url_by_id(&self, id: u64) -> Result<Option<String>> {
        let Some(db_id) = to_db_id(id) else {
            return Ok(None);
        };
        let db = &self.db;
        let url = retry::with_retry("find_url_by_id", self.retry_config, || async {
            url_record::Entity::find_by_id(db_id)
                .select_only()
                .column(url_record::Column::LongUrl)
                .into_tuple::<String>()
                .one(db)
                .await
        })
        .await?;
        Ok(url)
    }

    async fn record_click(&self, id: u64, visited_at: DateTime<Utc>) -> Result<()> {
        let Some(db_id) = to_db_id(id) else {
            return Err(SnaplinkError::not_found(format!("url id {} not found", id)));
        };
        let db = &self.db;

        // 单条 UPDATE，自增在数据库侧完成；超时不重试，避免重复计数
        let config = self.retry_config.without_timeout_retry();
        let result = retry::with_retry("record_click", config, || async {
            url_record::Entity::update_many()
                .col_expr(
                    url_record::Column::ClickCount,
                    Expr::col(url_record::Column::ClickCount).add(1),
                )
                .col_expr(url_record::Column::LastVisitedAt, Expr::value(visited_at))
                .filter(url_record::Column::Id.eq(db_id))
                .exec(db)
                .await
        })
        .await?;

        if result.rows_affected == 0 {
            return Err(SnaplinkError::not_found(format!("url id {} not found", id)));
        }
        Ok(())
    }

    async fn fetch_stats(&self, id: u64) -> Result<Option<UrlStats>> {
        let Some(db_id) = to_db_id(id) else {
            return Ok(None);
        };
        let db = &self.db;
        let model = retry::with_retry("fetch_stats", self.retry_config, || async {
            url_record::Entity::find_by_id(db_id).one(db).await
        })
        .await?;

        Ok(model.map(|m| UrlStats {
            id,
            long_url: m.long_url,
            total_clicks: u64::try_from(m.click_count).unwrap_or(0),
            last_visited: m.last_visited_at,
        }))
    }

    async fn count(&self) -> Result<u64> {
        let db = &self.db;
        let count = retry::with_retry("count", self.retry_config, || async {
            url_record::Entity::find().count(db).await
        })
        .await?;
        Ok(count)
    }

    async fn load_url_page(&self, after_id: u64, limit: u64) -> Result<Vec<UrlPageEntry>> {
        let Some(after) = to_db_id(after_id) else {
            return Ok(Vec::new());
        };
        let db = &self.db;
        let rows = retry::with_retry("load_url_page", self.retry_config, || async {
            url_record::Entity::find()
                .select_only()
                .column(url_record::Column::Id)
                .column(url_record::Column::LongUrl)
                .filter(url_record::Column::Id.gt(after))
                .order_by_asc(url_record::Column::Id)
                .limit(limit)
                .into_tuple::<(i64, String)>()
                .all(db)
                .await
        })
        .await?;

        rows.into_iter()
            .map(|(id, long_url)| Ok(UrlPageEntry { id: from_db_id(id)?, long_url }))
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        let db = &self.db;
        let backend = db.get_database_backend();
        db.execute(sea_orm::Statement::from_string(backend, "SELECT 1"))
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        &self.backend_name
    }
}
