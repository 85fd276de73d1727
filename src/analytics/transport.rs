//! 点击事件的发布/订阅通道

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

use crate::config::RedisConfig;
use crate::errors::{Result, SnaplinkError};

#[async_trait]
pub trait ClickTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, channel: &str, payload: String) -> Result<()>;

    /// 订阅成功返回后，之后发布的消息保证能收到
    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>>;
}

/// Redis PUBLISH / SUBSCRIBE
///
/// 通道名不加 key 前缀，与其他语言的 worker 互通。
pub struct RedisClickTransport {
    client: redis::Client,
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
}

impl RedisClickTransport {
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.clone()).map_err(|e| {
            SnaplinkError::config(format!("Invalid Redis URL '{}': {}", config.url, e))
        })?;
        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(None)),
        })
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SnaplinkError::transport(format!("Redis connect failed: {}", e)))?;
        *conn_guard = Some(new_conn.clone());
        Ok(new_conn)
    }

    async fn reset_connection(&self) {
        *self.connection.write().await = None;
        debug!("Redis publish connection reset due to error");
    }
}

#[async_trait]
impl ClickTransport for RedisClickTransport {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<i64> = conn.publish(channel, payload).await;
        match result {
            Ok(receivers) => {
                debug!("Published to '{}', {} receivers", channel, receivers);
                Ok(())
            }
            Err(e) => {
                self.reset_connection().await;
                Err(SnaplinkError::transport(format!("PUBLISH failed: {}", e)))
            }
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| SnaplinkError::transport(format!("Redis pub/sub connect failed: {}", e)))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| SnaplinkError::transport(format!("SUBSCRIBE failed: {}", e)))?;

        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                match msg.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!("Dropping non-text pub/sub payload: {}", e);
                        None
                    }
                }
            })
            .boxed();
        Ok(stream)
    }
}

/// 进程内通道（单进程部署和测试）
pub struct LocalClickTransport {
    channels: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl LocalClickTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for LocalClickTransport {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl ClickTransport for LocalClickTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        // 没有订阅者时与 Redis 一致：消息直接丢弃
        if self.sender(channel).send(payload).is_err() {
            debug!("No subscribers on '{}', event discarded", channel);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>> {
        let rx = self.sender(channel).subscribe();
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Local click subscriber lagged, {} events lost", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed();
        Ok(stream)
    }
}
