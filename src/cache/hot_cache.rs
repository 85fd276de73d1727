//! 热缓存（cache-aside）
//!
//! 两个方向各自独立过期：
//! - `code_to_long:<code>` → long_url
//! - `long_to_id:<sha256(long_url)>` → id
//!
//! 缓存只是加速层，读失败一律当作未命中，写失败只记录日志。

use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use crate::cache::KvBackend;
use crate::cache::kv::with_deadline;
use crate::utils::hash_url;

const CODE_TO_LONG: &str = "code_to_long:";
const LONG_TO_ID: &str = "long_to_id:";

pub struct HotCache {
    backend: Arc<dyn KvBackend>,
    ttl: Duration,
    op_timeout: Duration,
}

impl HotCache {
    pub fn new(backend: Arc<dyn KvBackend>, ttl: Duration, op_timeout: Duration) -> Self {
        Self {
            backend,
            ttl,
            op_timeout,
        }
    }

    pub fn code_key(code: &str) -> String {
        format!("{}{}", CODE_TO_LONG, code)
    }

    pub fn url_key(long_url: &str) -> String {
        format!("{}{}", LONG_TO_ID, hash_url(long_url))
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    pub async fn get_url(&self, code: &str) -> Option<String> {
        self.read(&Self::code_key(code)).await
    }

    pub async fn get_id(&self, long_url: &str) -> Option<u64> {
        let key = Self::url_key(long_url);
        let raw = self.read(&key).await?;
        match raw.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("HotCache: non-numeric id under {}: {:?}", key, raw);
                None
            }
        }
    }

    pub async fn put_url(&self, code: &str, long_url: &str) {
        self.write(&Self::code_key(code), long_url).await;
    }

    pub async fn put_id(&self, long_url: &str, id: u64) {
        self.write(&Self::url_key(long_url), &id.to_string()).await;
    }

    /// 两个方向一起写
    pub async fn put_mapping(&self, code: &str, long_url: &str, id: u64) {
        self.put_url(code, long_url).await;
        self.put_id(long_url, id).await;
    }

    async fn read(&self, key: &str) -> Option<String> {
        match with_deadline(self.op_timeout, self.backend.get(key)).await {
            Ok(Some(value)) => {
                trace!("HotCache hit: {}", key);
                Some(value)
            }
            Ok(None) => {
                trace!("HotCache miss: {}", key);
                None
            }
            Err(e) => {
                warn!("HotCache read {} failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &str) {
        if let Err(e) = with_deadline(self.op_timeout, self.backend.set_ex(key, value, self.ttl)).await
        {
            warn!("HotCache write {} failed, ignored: {}", key, e);
        }
    }
}
