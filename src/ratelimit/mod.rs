//! 请求限流
//!
//! 两个独立的限流器，计数都放在共享 KV 后端里：
//! - 全局固定窗口：一个计数器，第一次自增时设置过期时间，窗口边界由此隐式确定
//! - 按客户端滑动窗口：每个客户端一个有序时间戳集合
//!
//! 请求需要先后通过全局和按客户端两道检查。KV 后端不可用时放行。

mod client;
mod fixed_window;
mod middleware;
mod sliding_window;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::KvBackend;
use crate::config::RateLimitConfig;

pub use client::{UNKNOWN_CLIENT, client_identity, client_identity_from_request};
pub use fixed_window::FixedWindowLimiter;
pub use middleware::{RateLimit, RateLimitService};
pub use sliding_window::SlidingWindowLimiter;

/// 限流 key 的命名空间，与热缓存的 key 不相交
pub const KEY_NAMESPACE: &str = "ratelimit:";

/// 单次限流检查的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Rejected {
        /// 当前窗口剩余时间（拿不到时为 `None`）
        retry_after: Option<Duration>,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// 全局 + 按客户端的组合
pub struct RateLimiters {
    global: Option<FixedWindowLimiter>,
    per_client: Option<SlidingWindowLimiter>,
}

impl RateLimiters {
    pub fn new(
        global: Option<FixedWindowLimiter>,
        per_client: Option<SlidingWindowLimiter>,
    ) -> Self {
        Self { global, per_client }
    }

    /// 按配置构建；`enabled = false` 时两个限流器都不创建
    pub fn from_config(
        config: &RateLimitConfig,
        kv: Arc<dyn KvBackend>,
        op_timeout: Duration,
    ) -> Self {
        if !config.enabled {
            return Self::new(None, None);
        }
        let global = FixedWindowLimiter::new(
            Arc::clone(&kv),
            "global",
            config.global_limit,
            Duration::from_secs(config.global_window_secs),
            op_timeout,
        );
        let per_client = SlidingWindowLimiter::new(
            kv,
            config.per_client_limit,
            Duration::from_secs(config.per_client_window_secs),
            op_timeout,
        );
        Self::new(Some(global), Some(per_client))
    }

    pub fn is_enabled(&self) -> bool {
        self.global.is_some() || self.per_client.is_some()
    }

    /// 先全局，后按客户端；被全局拒绝的请求不计入客户端窗口
    pub async fn check(&self, client: &str) -> RateLimitDecision {
        if let Some(global) = &self.global {
            let decision = global.check().await;
            if !decision.is_allowed() {
                return decision;
            }
        }
        if let Some(per_client) = &self.per_client {
            return per_client.check(client).await;
        }
        RateLimitDecision::Allowed
    }
}
