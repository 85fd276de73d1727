use std::sync::Arc;

use async_trait::async_trait;

use super::{LinkMapping, LookupTier, TierOutcome};
use crate::cache::{ExistenceFilter, HotCache};
use crate::errors::Result;
use crate::storage::UrlStore;

/// 存在性过滤器：只会回答 `Absent` 或 `Miss`
pub struct FilterTier {
    filter: Arc<dyn ExistenceFilter>,
}

impl FilterTier {
    pub fn new(filter: Arc<dyn ExistenceFilter>) -> Self {
        Self { filter }
    }
}

#[async_trait]
impl LookupTier for FilterTier {
    fn name(&self) -> &'static str {
        "filter"
    }

    async fn find_id(&self, long_url: &str) -> Result<TierOutcome<u64>> {
        if self.filter.check(long_url).await {
            Ok(TierOutcome::Miss)
        } else {
            Ok(TierOutcome::Absent)
        }
    }

    async fn find_url(&self, _code: &str, _id: u64) -> Result<TierOutcome<String>> {
        Ok(TierOutcome::Miss)
    }

    async fn remember(&self, mapping: &LinkMapping) {
        self.filter.set(&mapping.long_url).await;
    }
}

/// 热缓存：命中或未命中，后端故障也按未命中处理
pub struct CacheTier {
    cache: Arc<HotCache>,
}

impl CacheTier {
    pub fn new(cache: Arc<HotCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl LookupTier for CacheTier {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn find_id(&self, long_url: &str) -> Result<TierOutcome<u64>> {
        Ok(match self.cache.get_id(long_url).await {
            Some(id) => TierOutcome::Hit(id),
            None => TierOutcome::Miss,
        })
    }

    async fn find_url(&self, code: &str, _id: u64) -> Result<TierOutcome<String>> {
        Ok(match self.cache.get_url(code).await {
            Some(url) => TierOutcome::Hit(url),
            None => TierOutcome::Miss,
        })
    }

    async fn remember(&self, mapping: &LinkMapping) {
        self.cache
            .put_mapping(&mapping.code, &mapping.long_url, mapping.id)
            .await;
    }
}

/// 持久化存储：权威层，只会回答 `Hit` 或 `Absent`，错误向上传播
pub struct StoreTier {
    store: Arc<dyn UrlStore>,
}

impl StoreTier {
    pub fn new(store: Arc<dyn UrlStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LookupTier for StoreTier {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn find_id(&self, long_url: &str) -> Result<TierOutcome<u64>> {
        Ok(match self.store.find_id_by_url(long_url).await? {
            Some(id) => TierOutcome::Hit(id),
            None => TierOutcome::Absent,
        })
    }

    async fn find_url(&self, _code: &str, id: u64) -> Result<TierOutcome<String>> {
        Ok(match self.store.find_url_by_id(id).await? {
            Some(url) => TierOutcome::Hit(url),
            None => TierOutcome::Absent,
        })
    }

    async fn remember(&self, _mapping: &LinkMapping) {}
}
