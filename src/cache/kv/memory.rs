use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::cache::KvBackend;
use crate::errors::{Result, SnaplinkError};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    ZSet(BTreeSet<(i64, String)>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn wrong_type(key: &str) -> SnaplinkError {
    SnaplinkError::cache_unavailable(format!(
        "WRONGTYPE operation against key '{}' holding the wrong kind of value",
        key
    ))
}

/// 进程内 KV 实现（单实例部署和测试用）
///
/// 每个 key 的读改写都在 DashMap 的分片锁内完成，等价于 Redis 单命令的原子性。
/// 过期的 key 在下次访问时惰性清理；不再被访问的 key 由 [`spawn_sweeper`]
/// 启动的后台任务定期回收。
///
/// [`spawn_sweeper`]: MemoryKvBackend::spawn_sweeper
#[derive(Default)]
pub struct MemoryKvBackend {
    entries: DashMap<String, Slot>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前未过期的 key 数量
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清理所有已过期的 key
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            trace!("MemoryKvBackend purged {} expired keys", removed);
        }
        removed
    }

    /// 每隔 `period` 调用一次 [`purge_expired`](Self::purge_expired)
    ///
    /// 任务只持有弱引用：backend 被释放或 `shutdown` 完成时退出。
    pub fn spawn_sweeper<F>(self: &Arc<Self>, period: Duration, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let backend = Arc::downgrade(self);
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次 tick 立即完成
            ticker.tick().await;
            tokio::pin!(shutdown);

            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {
                        let Some(backend) = backend.upgrade() else {
                            break;
                        };
                        backend.purge_expired();
                    }
                }
            }
            debug!("MemoryKvBackend sweeper stopped");
        })
    }

    /// 取出未过期的 entry；已过期的当场删除
    fn live_entry(&self, key: &str) -> Entry<'_, String, Slot> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_expired(now) => {
                occupied.remove();
                self.entries.entry(key.to_string())
            }
            other => other,
        }
    }
}

#[async_trait]
impl KvBackend for MemoryKvBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let Some(slot) = self.entries.get(key) else {
            return Ok(None);
        };
        if slot.is_expired(now) {
            drop(slot);
            self.entries.remove_if(key, |_, s| s.is_expired(now));
            return Ok(None);
        }
        match &slot.value {
            Value::Str(s) => Ok(Some(s.clone())),
            Value::ZSet(_) => Err(wrong_type(key)),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Slot {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        match self.live_entry(key) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                let Value::Str(ref mut raw) = slot.value else {
                    return Err(wrong_type(key));
                };
                let current: i64 = raw.parse().map_err(|_| {
                    SnaplinkError::cache_unavailable(format!(
                        "value of '{}' is not an integer",
                        key
                    ))
                })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    SnaplinkError::cache_unavailable(format!("increment of '{}' overflows", key))
                })?;
                *raw = next.to_string();
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: Value::Str("1".to_string()),
                    expires_at: None,
                });
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        match self.live_entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        Ok(self.entries.get(key).and_then(|slot| {
            slot.expires_at
                .filter(|at| *at > now)
                .map(|at| at.saturating_duration_since(now))
        }))
    }

    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<()> {
        match self.live_entry(key) {
            Entry::Occupied(mut occupied) => {
                let Value::ZSet(ref mut set) = occupied.get_mut().value else {
                    return Err(wrong_type(key));
                };
                // 同一 member 只保留一个 score
                set.retain(|(_, m)| m != member);
                set.insert((score, member.to_string()));
                Ok(())
            }
            Entry::Vacant(vacant) => {
                let mut set = BTreeSet::new();
                set.insert((score, member.to_string()));
                vacant.insert(Slot {
                    value: Value::ZSet(set),
                    expires_at: None,
                });
                Ok(())
            }
        }
    }

    async fn zrem_range_by_score(&self, key: &str, min: i64, max: i64) -> Result<u64> {
        match self.live_entry(key) {
            Entry::Occupied(mut occupied) => {
                let Value::ZSet(ref mut set) = occupied.get_mut().value else {
                    return Err(wrong_type(key));
                };
                let before = set.len();
                set.retain(|(score, _)| *score < min || *score > max);
                let removed = (before - set.len()) as u64;
                if set.is_empty() {
                    occupied.remove();
                }
                Ok(removed)
            }
            Entry::Vacant(_) => Ok(0),
        }
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(slot) if !slot.is_expired(now) => match &slot.value {
                Value::ZSet(set) => Ok(set.len() as u64),
                Value::Str(_) => Err(wrong_type(key)),
            },
            _ => Ok(0),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_ex_and_get() {
        let kv = MemoryKvBackend::new();
        kv.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(kv.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let kv = MemoryKvBackend::new();
        kv.set_ex("k", "v", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_incr_starts_at_one_without_expiry() {
        let kv = MemoryKvBackend::new();
        assert_eq!(kv.incr("c").await.unwrap(), 1);
        assert_eq!(kv.incr("c").await.unwrap(), 2);
        assert_eq!(kv.ttl("c").await.unwrap(), None);

        assert!(kv.expire("c", Duration::from_secs(30)).await.unwrap());
        let ttl = kv.ttl("c").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(30) && ttl > Duration::from_secs(29));
    }

    #[tokio::test]
    async fn test_incr_restarts_after_expiry() {
        let kv = MemoryKvBackend::new();
        kv.incr("c").await.unwrap();
        kv.incr("c").await.unwrap();
        kv.expire("c", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(kv.incr("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let kv = MemoryKvBackend::new();
        assert!(!kv.expire("nope", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_sorted_set_ops() {
        let kv = MemoryKvBackend::new();
        for (score, member) in [(10, "a"), (20, "b"), (30, "c")] {
            kv.zadd("z", score, member).await.unwrap();
        }
        assert_eq!(kv.zcard("z").await.unwrap(), 3);

        // 重复 member 更新 score 而不是新增
        kv.zadd("z", 35, "c").await.unwrap();
        assert_eq!(kv.zcard("z").await.unwrap(), 3);

        assert_eq!(kv.zrem_range_by_score("z", i64::MIN, 20).await.unwrap(), 2);
        assert_eq!(kv.zcard("z").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let kv = MemoryKvBackend::new();
        kv.zadd("z", 1, "a").await.unwrap();
        assert!(matches!(
            kv.incr("z").await,
            Err(SnaplinkError::CacheUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_incr_is_atomic() {
        let kv = Arc::new(MemoryKvBackend::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let kv = Arc::clone(&kv);
            handles.push(tokio::spawn(async move { kv.incr("n").await.unwrap() }));
        }
        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap());
        }
        seen.sort();
        assert_eq!(seen, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_idle_keys() {
        let kv = Arc::new(MemoryKvBackend::new());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let sweeper = kv.spawn_sweeper(Duration::from_millis(10), async move {
            let _ = stop_rx.await;
        });

        // 每个客户端只来一次，之后再也不访问自己的窗口
        for i in 0..10_000 {
            let key = format!("ratelimit:client:10.{}.{}.1", i / 256, i % 256);
            kv.zadd(&key, i, "req").await.unwrap();
            kv.expire(&key, Duration::from_millis(10)).await.unwrap();
        }
        kv.set_ex("keep", "v", Duration::from_secs(60)).await.unwrap();

        let mut resident = kv.entries.len();
        for _ in 0..100 {
            if resident == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            resident = kv.entries.len();
        }
        assert_eq!(resident, 1);
        assert_eq!(kv.get("keep").await.unwrap(), Some("v".to_string()));

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_backend_dropped() {
        let kv = Arc::new(MemoryKvBackend::new());
        let sweeper = kv.spawn_sweeper(Duration::from_millis(5), std::future::pending());
        drop(kv);
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();
    }
}
