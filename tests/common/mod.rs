//! 集成测试共用的构造函数
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use snaplink::analytics::ClickPublisher;
use snaplink::cache::{BloomExistenceFilter, ExistenceFilter, HotCache, KvBackend, MemoryKvBackend};
use snaplink::config::DatabaseConfig;
use snaplink::services::LinkService;
use snaplink::storage::{SeaOrmStorage, StorageFactory, UrlStore};
use snaplink::utils::StandardUrlSafety;

/// 临时目录中的 SQLite 数据库；TempDir 必须活得和存储一样久
pub async fn temp_storage() -> (TempDir, Arc<SeaOrmStorage>) {
    let dir = TempDir::new().expect("创建临时目录失败");
    let config = DatabaseConfig {
        database_url: format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display()),
        ..Default::default()
    };
    let storage = StorageFactory::create(&config)
        .await
        .expect("创建存储失败");
    (dir, storage)
}

pub fn memory_kv() -> Arc<dyn KvBackend> {
    Arc::new(MemoryKvBackend::new())
}

pub fn hot_cache(kv: Arc<dyn KvBackend>) -> Arc<HotCache> {
    Arc::new(HotCache::new(
        kv,
        Duration::from_secs(86_400),
        Duration::from_millis(500),
    ))
}

pub fn bloom_filter() -> Arc<dyn ExistenceFilter> {
    Arc::new(BloomExistenceFilter::new(10_000, 0.01).expect("创建过滤器失败"))
}

/// 不查 DNS 的 LinkService
pub fn link_service(store: Arc<dyn UrlStore>, clicks: ClickPublisher) -> LinkService {
    LinkService::new(
        store,
        bloom_filter(),
        hot_cache(memory_kv()),
        Arc::new(StandardUrlSafety::offline()),
        clicks,
    )
}
