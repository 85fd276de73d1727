//! 点击统计管道：跳转时发布事件，consumer 聚合进存储

pub mod consumer;
pub mod event;
pub mod publisher;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheBackendKind, CacheConfig, ClickMode, ClicksConfig};
use crate::errors::Result;
use crate::storage::UrlStore;

pub use consumer::{ClickConsumer, ConsumerReport};
pub use event::ClickEvent;
pub use publisher::ClickPublisher;
pub use transport::{ClickTransport, LocalClickTransport, RedisClickTransport};

/// 按缓存后端选择通道：Redis 部署用 Redis pub/sub，否则进程内广播
pub fn create_click_transport(cache: &CacheConfig) -> Result<Arc<dyn ClickTransport>> {
    Ok(match cache.backend {
        CacheBackendKind::Redis => Arc::new(RedisClickTransport::new(&cache.redis)?),
        CacheBackendKind::Memory => Arc::new(LocalClickTransport::default()),
    })
}

pub fn create_click_publisher(
    config: &ClicksConfig,
    transport: Arc<dyn ClickTransport>,
    store: Arc<dyn UrlStore>,
) -> ClickPublisher {
    let timeout = Duration::from_millis(config.publish_timeout_ms);
    match config.mode {
        ClickMode::Pubsub => ClickPublisher::pubsub(transport, config.channel.clone(), timeout),
        ClickMode::Inline => ClickPublisher::inline(store, timeout),
        ClickMode::Disabled => ClickPublisher::disabled(),
    }
}
