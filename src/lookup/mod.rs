//! 分层查找
//!
//! 查找策略表达为有序的 tier 列表，每一层回答 `Hit` / `Miss` / `Absent`：
//! - `Hit`：命中，用结果回填排在它前面的各层
//! - `Miss`：这一层不知道，继续问下一层
//! - `Absent`：确定不存在，直接结束
//!
//! 缩短：`[filter, cache, store]`；跳转：`[cache, store]`。

mod tiers;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::codec;
use crate::errors::Result;

pub use tiers::{CacheTier, FilterTier, StoreTier};

/// 单层的查找结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome<T> {
    Hit(T),
    Miss,
    Absent,
}

/// 一条完整的映射，用于回填
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMapping {
    pub id: u64,
    pub code: String,
    pub long_url: String,
}

impl LinkMapping {
    pub fn new(id: u64, long_url: impl Into<String>) -> Self {
        Self {
            id,
            code: codec::encode(id),
            long_url: long_url.into(),
        }
    }
}

#[async_trait]
pub trait LookupTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// long_url → id
    async fn find_id(&self, long_url: &str) -> Result<TierOutcome<u64>>;

    /// code → long_url；`id` 为 code 解码后的值
    async fn find_url(&self, code: &str, id: u64) -> Result<TierOutcome<String>>;

    /// 记住一条映射（加速层写入，权威层忽略）
    async fn remember(&self, mapping: &LinkMapping);
}

/// 有序 tier 链
pub struct TieredLookup {
    shorten_chain: Vec<Arc<dyn LookupTier>>,
    resolve_chain: Vec<Arc<dyn LookupTier>>,
}

impl TieredLookup {
    pub fn new(
        shorten_chain: Vec<Arc<dyn LookupTier>>,
        resolve_chain: Vec<Arc<dyn LookupTier>>,
    ) -> Self {
        Self {
            shorten_chain,
            resolve_chain,
        }
    }

    /// 标准组合：filter → cache → store / cache → store
    pub fn standard(filter: FilterTier, cache: CacheTier, store: StoreTier) -> Self {
        let filter: Arc<dyn LookupTier> = Arc::new(filter);
        let cache: Arc<dyn LookupTier> = Arc::new(cache);
        let store: Arc<dyn LookupTier> = Arc::new(store);
        Self::new(
            vec![filter, Arc::clone(&cache), Arc::clone(&store)],
            vec![cache, store],
        )
    }

    /// 按缩短链查找已存在的 id
    pub async fn find_id(&self, long_url: &str) -> Result<Option<u64>> {
        for (i, tier) in self.shorten_chain.iter().enumerate() {
            match tier.find_id(long_url).await? {
                TierOutcome::Hit(id) => {
                    trace!("find_id hit at tier '{}'", tier.name());
                    let mapping = LinkMapping::new(id, long_url);
                    Self::backfill(&self.shorten_chain[..i], &mapping).await;
                    return Ok(Some(id));
                }
                TierOutcome::Miss => {
                    trace!("find_id miss at tier '{}'", tier.name());
                }
                TierOutcome::Absent => {
                    trace!("find_id: tier '{}' reports absent", tier.name());
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }

    /// 按跳转链查找 code 对应的长链接
    pub async fn find_url(&self, code: &str, id: u64) -> Result<Option<String>> {
        for (i, tier) in self.resolve_chain.iter().enumerate() {
            match tier.find_url(code, id).await? {
                TierOutcome::Hit(long_url) => {
                    trace!("find_url hit at tier '{}'", tier.name());
                    let mapping = LinkMapping {
                        id,
                        code: code.to_string(),
                        long_url,
                    };
                    Self::backfill(&self.resolve_chain[..i], &mapping).await;
                    return Ok(Some(mapping.long_url));
                }
                TierOutcome::Miss => {
                    trace!("find_url miss at tier '{}'", tier.name());
                }
                TierOutcome::Absent => {
                    trace!("find_url: tier '{}' reports absent", tier.name());
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }

    /// 新插入的映射写入缩短链上的每一层
    pub async fn remember(&self, mapping: &LinkMapping) {
        Self::backfill(&self.shorten_chain, mapping).await;
    }

    async fn backfill(tiers: &[Arc<dyn LookupTier>], mapping: &LinkMapping) {
        for tier in tiers {
            tier.remember(mapping).await;
        }
    }
}
