use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{trace, warn};
use uuid::Uuid;

use super::{KEY_NAMESPACE, RateLimitDecision};
use crate::cache::KvBackend;
use crate::cache::kv::with_deadline;
use crate::errors::Result;

/// 按客户端的滑动窗口限流
///
/// 每个客户端一个有序集合，score 为请求时间（毫秒）。检查时先删掉窗口外的记录，
/// 剩余数量达到上限则拒绝，否则记录本次请求并把过期时间刷新为两倍窗口。
pub struct SlidingWindowLimiter {
    kv: Arc<dyn KvBackend>,
    limit: u64,
    window: Duration,
    op_timeout: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(
        kv: Arc<dyn KvBackend>,
        limit: u64,
        window: Duration,
        op_timeout: Duration,
    ) -> Self {
        Self {
            kv,
            limit,
            window,
            op_timeout,
        }
    }

    pub fn key_for(client: &str) -> String {
        format!("{}client:{}", KEY_NAMESPACE, client)
    }

    pub async fn check(&self, client: &str) -> RateLimitDecision {
        match self.try_check(client).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    "Per-client rate limiter unavailable for {}, allowing request: {}",
                    client, e
                );
                RateLimitDecision::Allowed
            }
        }
    }

    async fn try_check(&self, client: &str) -> Result<RateLimitDecision> {
        let key = Self::key_for(client);
        let now = Utc::now().timestamp_millis();
        let window_ms = self.window.as_millis() as i64;

        with_deadline(
            self.op_timeout,
            self.kv.zrem_range_by_score(&key, i64::MIN, now - window_ms),
        )
        .await?;
        let count = with_deadline(self.op_timeout, self.kv.zcard(&key)).await?;

        if count >= self.limit {
            let ttl = with_deadline(self.op_timeout, self.kv.ttl(&key)).await?;
            // key 的过期时间是两倍窗口，超过一个窗口的部分没有意义
            let retry_after = ttl.map(|t| t.min(self.window));
            trace!("Client {} over limit: {}/{}", client, count, self.limit);
            return Ok(RateLimitDecision::Rejected { retry_after });
        }

        let member = format!("{}-{}", now, Uuid::new_v4());
        with_deadline(self.op_timeout, self.kv.zadd(&key, now, &member)).await?;
        with_deadline(self.op_timeout, self.kv.expire(&key, self.window * 2)).await?;

        trace!("Client {} rate limit: {}/{}", client, count + 1, self.limit);
        Ok(RateLimitDecision::Allowed)
    }
}
