use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::DatabaseConfig;
use crate::errors::Result;

pub mod backend;
pub mod models;

pub use backend::SeaOrmStorage;
pub use models::{InsertOutcome, StorageInfo, UrlPageEntry, UrlStats};

/// 持久化存储：URL 记录的唯一权威来源
///
/// `long_url` 上的唯一约束是并发安全的唯一保证，实现不得在应用层加锁替代它。
#[async_trait]
pub trait UrlStore: Send + Sync {
    /// 已存在则返回原 id，否则插入并返回新 id
    async fn insert_if_absent(&self, long_url: &str) -> Result<InsertOutcome>;

    async fn find_id_by_url(&self, long_url: &str) -> Result<Option<u64>>;

    async fn find_url_by_id(&self, id: u64) -> Result<Option<String>>;

    /// click_count + 1 并写入 last_visited_at；id 不存在返回 `NotFound`
    async fn record_click(&self, id: u64, visited_at: DateTime<Utc>) -> Result<()>;

    async fn fetch_stats(&self, id: u64) -> Result<Option<UrlStats>>;

    async fn count(&self) -> Result<u64>;

    /// 按 id 升序返回 `id > after_id` 的至多 `limit` 条记录
    async fn load_url_page(&self, after_id: u64, limit: u64) -> Result<Vec<UrlPageEntry>>;

    /// 健康检查
    async fn ping(&self) -> Result<()>;

    fn backend_name(&self) -> &str;
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<SeaOrmStorage>> {
        // 从 URL 自动推断数据库类型
        let backend_type = backend::infer_backend_from_url(&config.database_url)?;

        let storage = SeaOrmStorage::new(config, &backend_type).await?;
        Ok(Arc::new(storage))
    }
}
