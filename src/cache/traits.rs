use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Result;
use crate::storage::UrlStore;

/// 热缓存与限流计数器共用的 KV 原语
///
/// 语义与同名 Redis 命令一致。所有 key 由调用方决定命名空间，
/// 实现负责加上全局前缀（如果有）。
#[async_trait]
pub trait KvBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// 原子自增并返回自增后的值；key 不存在时从 0 开始
    async fn incr(&self, key: &str) -> Result<i64>;

    /// 设置过期时间，返回 key 是否存在
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 剩余存活时间；key 不存在或没有过期时间时返回 `None`
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<()>;

    /// 删除 score 落在 `[min, max]` 的成员，返回删除数量
    async fn zrem_range_by_score(&self, key: &str, min: i64, max: i64) -> Result<u64>;

    async fn zcard(&self, key: &str) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

/// 存在性过滤器
///
/// 只是加速手段：`false` 表示**一定不存在**，`true` 表示**可能存在**。
/// 尚未完成 `populate` 时必须返回 `true`。
#[async_trait]
pub trait ExistenceFilter: Send + Sync {
    async fn check(&self, key: &str) -> bool;

    /// 记录新写入的 URL
    async fn set(&self, key: &str);

    /// 从存储全量构建，完成后进入 ready 状态
    async fn populate(&self, store: &dyn UrlStore) -> Result<usize>;

    fn is_ready(&self) -> bool;

    fn name(&self) -> &'static str;
}
