//! KV 后端：Redis 或进程内实现

mod memory;
mod redis_kv;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::KvBackend;
use crate::config::{CacheBackendKind, CacheConfig};
use crate::errors::Result;

pub use memory::MemoryKvBackend;
pub use redis_kv::RedisKvBackend;

/// 根据配置创建 KV 后端
///
/// 内存后端会带上一个定期清理过期 key 的后台任务，`shutdown` 完成时停止，
/// 因此必须在 tokio runtime 内调用。
pub fn create_kv_backend<F>(config: &CacheConfig, shutdown: F) -> Result<Arc<dyn KvBackend>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let backend: Arc<dyn KvBackend> = match config.backend {
        CacheBackendKind::Memory => {
            let memory = Arc::new(MemoryKvBackend::new());
            memory.spawn_sweeper(Duration::from_secs(config.sweep_interval_secs), shutdown);
            memory
        }
        CacheBackendKind::Redis => Arc::new(RedisKvBackend::new(&config.redis)?),
    };
    info!("KV backend: {}", backend.name());
    Ok(backend)
}

/// 给单次 KV 调用加上截止时间，超时视为 `CacheUnavailable`
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(elapsed.into()),
    }
}

/// 所有操作都返回 `CacheUnavailable` 的后端
#[cfg(test)]
pub(crate) struct UnavailableKv;

#[cfg(test)]
#[async_trait::async_trait]
impl KvBackend for UnavailableKv {
    fn name(&self) -> &'static str {
        "unavailable"
    }
    async fn get(&self, _: &str) -> Result<Option<String>> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
    async fn set_ex(&self, _: &str, _: &str, _: Duration) -> Result<()> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
    async fn incr(&self, _: &str) -> Result<i64> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
    async fn expire(&self, _: &str, _: Duration) -> Result<bool> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
    async fn ttl(&self, _: &str) -> Result<Option<Duration>> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
    async fn zadd(&self, _: &str, _: i64, _: &str) -> Result<()> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
    async fn zrem_range_by_score(&self, _: &str, _: i64, _: i64) -> Result<u64> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
    async fn zcard(&self, _: &str) -> Result<u64> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
    async fn ping(&self) -> Result<()> {
        Err(crate::errors::SnaplinkError::cache_unavailable("down"))
    }
}
