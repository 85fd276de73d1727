//! Link service
//!
//! 缩短、跳转、预览和统计的业务编排，HTTP 层和 CLI 共用。
//! 查找顺序由 `TieredLookup` 决定；这里负责校验、写入和点击事件。

use std::sync::Arc;

use tracing::{debug, info};

use crate::analytics::ClickPublisher;
use crate::cache::{ExistenceFilter, HotCache};
use crate::codec;
use crate::errors::{Result, SnaplinkError};
use crate::lookup::{CacheTier, FilterTier, LinkMapping, StoreTier, TieredLookup};
use crate::storage::{UrlStats, UrlStore};
use crate::utils::{UrlSafety, build_short_url};

/// `shorten` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenOutcome {
    pub id: u64,
    pub code: String,
    /// 本次调用新建了记录
    pub created: bool,
}

pub struct LinkService {
    store: Arc<dyn UrlStore>,
    filter: Arc<dyn ExistenceFilter>,
    cache: Arc<HotCache>,
    lookup: TieredLookup,
    safety: Arc<dyn UrlSafety>,
    clicks: ClickPublisher,
}

impl LinkService {
    pub fn new(
        store: Arc<dyn UrlStore>,
        filter: Arc<dyn ExistenceFilter>,
        cache: Arc<HotCache>,
        safety: Arc<dyn UrlSafety>,
        clicks: ClickPublisher,
    ) -> Self {
        let lookup = TieredLookup::standard(
            FilterTier::new(Arc::clone(&filter)),
            CacheTier::new(Arc::clone(&cache)),
            StoreTier::new(Arc::clone(&store)),
        );
        Self {
            store,
            filter,
            cache,
            lookup,
            safety,
            clicks,
        }
    }

    pub fn store(&self) -> &Arc<dyn UrlStore> {
        &self.store
    }

    pub fn filter(&self) -> &Arc<dyn ExistenceFilter> {
        &self.filter
    }

    pub fn cache(&self) -> &Arc<HotCache> {
        &self.cache
    }

    /// 长链接 → 短码
    ///
    /// 同一个 URL 并发缩短时，由存储的唯一约束保证收敛到同一个 id。
    pub async fn shorten(&self, long_url: &str) -> Result<ShortenOutcome> {
        let long_url = long_url.trim();
        self.safety.check(long_url).await?;

        if let Some(id) = self.lookup.find_id(long_url).await? {
            debug!("Existing mapping for {}: id={}", long_url, id);
            return Ok(ShortenOutcome {
                id,
                code: codec::encode(id),
                created: false,
            });
        }

        let inserted = self.store.insert_if_absent(long_url).await?;
        let mapping = LinkMapping::new(inserted.id, long_url);
        self.lookup.remember(&mapping).await;

        if inserted.created {
            info!("Short link created: {} -> {}", mapping.code, long_url);
        }
        Ok(ShortenOutcome {
            id: inserted.id,
            code: mapping.code,
            created: inserted.created,
        })
    }

    /// 短码 → 长链接，并发出一次点击事件
    pub async fn resolve(&self, code: &str) -> Result<String> {
        let (id, long_url) = self.find(code).await?;
        // 不等待投递
        let _ = self.clicks.publish(id);
        Ok(long_url)
    }

    /// 与 `resolve` 相同，但不计点击
    pub async fn preview(&self, code: &str) -> Result<String> {
        self.find(code).await.map(|(_, long_url)| long_url)
    }

    pub async fn stats(&self, code: &str) -> Result<UrlStats> {
        let id = Self::decode_known(code)?;
        self.store
            .fetch_stats(id)
            .await?
            .ok_or_else(|| Self::not_found(code))
    }

    /// 从存储构建过滤器；失败时过滤器保持未就绪（全部放行到慢路径）
    pub async fn populate_filter(&self) -> Result<usize> {
        self.filter.populate(self.store.as_ref()).await
    }

    pub fn short_url(&self, base: &str, code: &str) -> String {
        build_short_url(base, code)
    }

    async fn find(&self, code: &str) -> Result<(u64, String)> {
        let id = Self::decode_known(code)?;
        match self.lookup.find_url(code, id).await? {
            Some(long_url) => Ok((id, long_url)),
            None => Err(Self::not_found(code)),
        }
    }

    /// 只接受规范短码：无法解码，或者不是 `encode(id)` 的原样输出，都按不存在处理
    fn decode_known(code: &str) -> Result<u64> {
        match codec::decode(code) {
            Ok(id) if codec::encode(id) == code => Ok(id),
            Ok(_) => {
                debug!("Non-canonical short code rejected: {}", code);
                Err(Self::not_found(code))
            }
            Err(e) => {
                debug!("{}", e);
                Err(Self::not_found(code))
            }
        }
    }

    fn not_found(code: &str) -> SnaplinkError {
        SnaplinkError::not_found(format!("Short code not found: {}", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{ClickEvent, ClickTransport, LocalClickTransport};
    use crate::cache::kv::UnavailableKv;
    use crate::cache::{BloomExistenceFilter, MemoryKvBackend, NullExistenceFilter};
    use crate::config::DatabaseConfig;
    use crate::storage::StorageFactory;
    use crate::utils::StandardUrlSafety;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn temp_store(dir: &TempDir) -> Arc<dyn UrlStore> {
        let config = DatabaseConfig {
            database_url: format!(
                "sqlite://{}?mode=rwc",
                dir.path().join("links.db").display()
            ),
            ..Default::default()
        };
        StorageFactory::create(&config).await.unwrap()
    }

    fn memory_cache() -> Arc<HotCache> {
        Arc::new(HotCache::new(
            Arc::new(MemoryKvBackend::new()),
            Duration::from_secs(60),
            Duration::from_millis(200),
        ))
    }

    fn service(
        store: Arc<dyn UrlStore>,
        cache: Arc<HotCache>,
        clicks: ClickPublisher,
    ) -> LinkService {
        let filter: Arc<dyn ExistenceFilter> =
            Arc::new(BloomExistenceFilter::new(1000, 0.01).unwrap());
        LinkService::new(
            store,
            filter,
            cache,
            Arc::new(StandardUrlSafety::offline()),
            clicks,
        )
    }

    #[tokio::test]
    async fn test_shorten_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let svc = service(temp_store(&dir).await, memory_cache(), ClickPublisher::disabled());
        svc.populate_filter().await.unwrap();

        let first = svc.shorten("https://example.com/a").await.unwrap();
        assert!(first.created);
        let second = svc.shorten("https://example.com/a").await.unwrap();
        assert!(!second.created);
        assert_eq!(first.code, second.code);
        assert_eq!(svc.resolve(&first.code).await.unwrap(), "https://example.com/a");
    }

    #[tokio::test]
    async fn test_resolve_unknown_and_malformed_codes() {
        let dir = TempDir::new().unwrap();
        let svc = service(temp_store(&dir).await, memory_cache(), ClickPublisher::disabled());

        for code in ["not-a-real-code", "", codec::encode(424_242).as_str()] {
            assert!(
                matches!(svc.resolve(code).await, Err(SnaplinkError::NotFound(_))),
                "{:?}",
                code
            );
        }
    }

    #[tokio::test]
    async fn test_non_canonical_code_is_not_found() {
        let dir = TempDir::new().unwrap();
        let svc = service(temp_store(&dir).await, memory_cache(), ClickPublisher::disabled());
        let outcome = svc.shorten("https://example.com/lead").await.unwrap();

        // 前导 0 解码为同一个 id，但不是规范写法
        let padded = format!("0{}", outcome.code);
        assert!(matches!(
            svc.resolve(&padded).await,
            Err(SnaplinkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_shorten_rejects_unsafe_urls() {
        let dir = TempDir::new().unwrap();
        let svc = service(temp_store(&dir).await, memory_cache(), ClickPublisher::disabled());

        assert!(matches!(
            svc.shorten("javascript:alert(1)").await,
            Err(SnaplinkError::Unsafe(_))
        ));
        assert!(matches!(
            svc.shorten("http://127.0.0.1/admin").await,
            Err(SnaplinkError::Unsafe(_))
        ));
        assert!(matches!(
            svc.shorten("   ").await,
            Err(SnaplinkError::InvalidInput(_))
        ));
        assert_eq!(svc.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_outage_degrades_to_store() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(HotCache::new(
            Arc::new(UnavailableKv),
            Duration::from_secs(60),
            Duration::from_millis(50),
        ));
        let svc = service(temp_store(&dir).await, cache, ClickPublisher::disabled());

        let outcome = svc.shorten("https://example.com/down").await.unwrap();
        let again = svc.shorten("https://example.com/down").await.unwrap();
        assert_eq!(outcome.code, again.code);
        assert_eq!(
            svc.resolve(&outcome.code).await.unwrap(),
            "https://example.com/down"
        );
    }

    #[tokio::test]
    async fn test_preview_does_not_emit_click() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;
        let transport = Arc::new(LocalClickTransport::default());
        let mut events = transport.subscribe("clicks").await.unwrap();
        let clicks = ClickPublisher::pubsub(
            transport.clone() as Arc<dyn ClickTransport>,
            "clicks",
            Duration::from_secs(1),
        );
        let svc = service(store, memory_cache(), clicks);
        let outcome = svc.shorten("https://example.com/p").await.unwrap();

        svc.preview(&outcome.code).await.unwrap();
        svc.resolve(&outcome.code).await.unwrap();

        let payload = tokio::time::timeout(Duration::from_secs(1), events.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ClickEvent::from_payload(&payload).unwrap().id, outcome.id);
        // 只有 resolve 发出了事件
        assert!(
            tokio::time::timeout(Duration::from_millis(100), events.next())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_stats_after_inline_click() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;
        let clicks = ClickPublisher::inline(Arc::clone(&store), Duration::from_secs(1));
        let filter: Arc<dyn ExistenceFilter> = Arc::new(NullExistenceFilter);
        let svc = LinkService::new(
            store,
            filter,
            memory_cache(),
            Arc::new(StandardUrlSafety::offline()),
            clicks,
        );

        let outcome = svc.shorten("https://example.com/s").await.unwrap();
        let before = svc.stats(&outcome.code).await.unwrap();
        assert_eq!(before.total_clicks, 0);
        assert!(before.last_visited.is_none());

        svc.resolve(&outcome.code).await.unwrap();
        // inline 模式在后台任务中写库
        let mut after = svc.stats(&outcome.code).await.unwrap();
        for _ in 0..50 {
            if after.total_clicks == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            after = svc.stats(&outcome.code).await.unwrap();
        }
        assert_eq!(after.total_clicks, 1);
        assert!(after.last_visited.is_some());
    }
}
