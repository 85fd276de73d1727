//! 点击事件发布
//!
//! 跳转路径上调用 `publish`，立即返回；实际投递在独立任务中完成，
//! 并受 `publish_timeout` 约束。失败只写日志，不影响已经发出的跳转响应。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{ClickEvent, ClickTransport};
use crate::errors::SnaplinkError;
use crate::storage::UrlStore;

enum Target {
    /// 发布到 pub/sub，由 consumer 聚合
    PubSub {
        transport: Arc<dyn ClickTransport>,
        channel: String,
    },
    /// 直接写存储
    Inline { store: Arc<dyn UrlStore> },
    Disabled,
}

pub struct ClickPublisher {
    target: Target,
    timeout: Duration,
}

impl ClickPublisher {
    pub fn pubsub(
        transport: Arc<dyn ClickTransport>,
        channel: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            target: Target::PubSub {
                transport,
                channel: channel.into(),
            },
            timeout,
        }
    }

    pub fn inline(store: Arc<dyn UrlStore>, timeout: Duration) -> Self {
        Self {
            target: Target::Inline { store },
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            target: Target::Disabled,
            timeout: Duration::ZERO,
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.target {
            Target::PubSub { .. } => "pubsub",
            Target::Inline { .. } => "inline",
            Target::Disabled => "disabled",
        }
    }

    /// 记录一次点击，不等待投递结果
    ///
    /// 返回后台任务句柄（禁用时为 `None`），调用方通常直接丢弃。
    pub fn publish(&self, id: u64) -> Option<JoinHandle<()>> {
        let event = ClickEvent::now(id);
        let timeout = self.timeout;

        match &self.target {
            Target::Disabled => {
                trace!("Click tracking disabled, skip id={}", id);
                None
            }
            Target::PubSub { transport, channel } => {
                let payload = match event.to_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("Failed to encode click event for id={}: {}", id, e);
                        return None;
                    }
                };
                let transport = Arc::clone(transport);
                let channel = channel.clone();
                Some(tokio::spawn(async move {
                    match tokio::time::timeout(timeout, transport.publish(&channel, payload)).await
                    {
                        Ok(Ok(())) => debug!("Click event published: id={}", id),
                        Ok(Err(e)) => warn!("Failed to publish click event id={}: {}", id, e),
                        Err(_) => warn!(
                            "Publishing click event id={} timed out after {:?}",
                            id, timeout
                        ),
                    }
                }))
            }
            Target::Inline { store } => {
                let store = Arc::clone(store);
                Some(tokio::spawn(async move {
                    match tokio::time::timeout(
                        timeout,
                        store.record_click(event.id, event.timestamp),
                    )
                    .await
                    {
                        Ok(Ok(())) => debug!("Click recorded inline: id={}", id),
                        Ok(Err(SnaplinkError::NotFound(_))) => {
                            debug!("Click for unknown id={} ignored", id)
                        }
                        Ok(Err(e)) => warn!("Failed to record click id={}: {}", id, e),
                        Err(_) => warn!(
                            "Recording click id={} timed out after {:?}",
                            id, timeout
                        ),
                    }
                }))
            }
        }
    }
}
