use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use super::{KEY_NAMESPACE, RateLimitDecision};
use crate::cache::KvBackend;
use crate::cache::kv::with_deadline;
use crate::errors::Result;

/// 全局固定窗口限流
///
/// 计数器第一次被自增（值为 1）时设置过期时间，过期后下一次请求开启新窗口。
pub struct FixedWindowLimiter {
    kv: Arc<dyn KvBackend>,
    key: String,
    limit: u64,
    window: Duration,
    op_timeout: Duration,
}

impl FixedWindowLimiter {
    pub fn new(
        kv: Arc<dyn KvBackend>,
        name: &str,
        limit: u64,
        window: Duration,
        op_timeout: Duration,
    ) -> Self {
        Self {
            kv,
            key: format!("{}{}", KEY_NAMESPACE, name),
            limit,
            window,
            op_timeout,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn check(&self) -> RateLimitDecision {
        match self.try_check().await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Global rate limiter unavailable, allowing request: {}", e);
                RateLimitDecision::Allowed
            }
        }
    }

    async fn try_check(&self) -> Result<RateLimitDecision> {
        let count = with_deadline(self.op_timeout, self.kv.incr(&self.key)).await?;
        if count == 1 {
            with_deadline(self.op_timeout, self.kv.expire(&self.key, self.window)).await?;
        }

        if count <= self.limit as i64 {
            trace!("Global rate limit: {}/{}", count, self.limit);
            return Ok(RateLimitDecision::Allowed);
        }

        let mut retry_after = with_deadline(self.op_timeout, self.kv.ttl(&self.key)).await?;
        if retry_after.is_none() {
            // 自增成功但设置过期失败，计数器会永远存在
            warn!("Rate limit key {} has no expiry, resetting window", self.key);
            with_deadline(self.op_timeout, self.kv.expire(&self.key, self.window)).await?;
            retry_after = Some(self.window);
        }
        Ok(RateLimitDecision::Rejected { retry_after })
    }
}
