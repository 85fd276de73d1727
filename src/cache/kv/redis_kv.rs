use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::KvBackend;
use crate::config::RedisConfig;
use crate::errors::{Result, SnaplinkError};

/// Redis 实现，连接懒建立并缓存，出错后重置
pub struct RedisKvBackend {
    client: redis::Client,
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    key_prefix: String,
}

impl RedisKvBackend {
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.clone()).map_err(|e| {
            SnaplinkError::config(format!("Invalid Redis URL '{}': {}", config.url, e))
        })?;

        debug!(
            "RedisKvBackend created with prefix: '{}'",
            config.key_prefix
        );

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// 获取或建立持久连接
    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self.client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// 连接类错误需要丢弃缓存的连接，命令错误（WRONGTYPE 等）不需要
    async fn on_error(&self, op: &str, err: redis::RedisError) -> SnaplinkError {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            self.reset_connection().await;
        }
        warn!("Redis {} failed: {}", op, err);
        err.into()
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

#[async_trait]
impl KvBackend for RedisKvBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<Option<String>> = conn.get(self.make_key(key)).await;
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.on_error("GET", e).await),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<()> = redis::cmd("SET")
            .arg(self.make_key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.on_error("SET", e).await),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<i64> = conn.incr(self.make_key(key), 1).await;
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.on_error("INCR", e).await),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<bool> =
            conn.pexpire(self.make_key(key), ttl_millis(ttl)).await;
        match result {
            Ok(existed) => Ok(existed),
            Err(e) => Err(self.on_error("PEXPIRE", e).await),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<i64> = conn.pttl(self.make_key(key)).await;
        match result {
            // -2: key 不存在；-1: 没有过期时间
            Ok(ms) if ms >= 0 => Ok(Some(Duration::from_millis(ms as u64))),
            Ok(_) => Ok(None),
            Err(e) => Err(self.on_error("PTTL", e).await),
        }
    }

    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<()> = conn.zadd(self.make_key(key), member, score).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.on_error("ZADD", e).await),
        }
    }

    async fn zrem_range_by_score(&self, key: &str, min: i64, max: i64) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<u64> =
            conn.zrembyscore(self.make_key(key), min, max).await;
        match result {
            Ok(removed) => Ok(removed),
            Err(e) => Err(self.on_error("ZREMRANGEBYSCORE", e).await),
        }
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<u64> = conn.zcard(self.make_key(key)).await;
        match result {
            Ok(count) => Ok(count),
            Err(e) => Err(self.on_error("ZCARD", e).await),
        }
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(self.on_error("PING", e).await),
        }
    }
}
