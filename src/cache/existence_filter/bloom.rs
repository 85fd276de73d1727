use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bloomfilter::Bloom;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cache::ExistenceFilter;
use crate::errors::{Result, SnaplinkError};
use crate::storage::UrlStore;

/// populate 时每页读取的行数
const POPULATE_PAGE_SIZE: u64 = 1000;

/// Bloom Filter 实现
///
/// 容量和误判率在构造时确定；实际元素超过容量只会抬高误判率，不会产生漏判。
pub struct BloomExistenceFilter {
    inner: RwLock<Bloom<str>>,
    capacity: usize,
    fp_rate: f64,
    ready: AtomicBool,
    /// populate 期间收集新增 key 的 buffer。
    /// Some = 正在重建，set() 会同时写入 buffer
    /// None = 未在重建
    rebuild_buffer: Mutex<Option<Vec<String>>>,
}

impl BloomExistenceFilter {
    pub fn new(capacity: usize, fp_rate: f64) -> Result<Self> {
        let bloom = new_bloom(capacity, fp_rate)?;
        Ok(Self {
            inner: RwLock::new(bloom),
            capacity,
            fp_rate,
            ready: AtomicBool::new(false),
            rebuild_buffer: Mutex::new(None),
        })
    }

    /// 跳过 populate 直接进入 ready（空库启动时用）
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    fn stop_buffering(&self) {
        *self.rebuild_buffer.lock() = None;
    }
}

fn new_bloom(capacity: usize, fp_rate: f64) -> Result<Bloom<str>> {
    Bloom::new_for_fp_rate(capacity.max(1), fp_rate)
        .map_err(|e| SnaplinkError::config(format!("Failed to create bloom filter: {e}")))
}

/// 库里已有的数据量超过配置容量时，按实际数量预留余量
/// - < 5000: 预留 50%
/// - 5000-100000: 预留 20%
/// - > 100000: 预留 10%（最多 100 万）
fn calculate_capacity(configured: usize, count: usize) -> usize {
    let reserve = if count < 5000 {
        count / 2
    } else if count < 100_000 {
        count / 5
    } else {
        (count / 10).min(1_000_000)
    };
    configured.max(count + reserve.max(1000))
}

#[async_trait]
impl ExistenceFilter for BloomExistenceFilter {
    async fn check(&self, key: &str) -> bool {
        if !self.ready.load(Ordering::Acquire) {
            return true;
        }
        self.inner.read().check(key)
    }

    async fn set(&self, key: &str) {
        // 锁顺序：buffer lock → inner write lock（与 populate 一致）
        let mut buffer_guard = self.rebuild_buffer.lock();
        self.inner.write().set(key);
        if let Some(ref mut buffer) = *buffer_guard {
            buffer.push(key.to_string());
        }
    }

    /// 在锁外分页构建新的 Bloom，然后原子交换。
    /// 期间并发 set() 的 key 进入 buffer，交换前合并，保证零丢失。
    async fn populate(&self, store: &dyn UrlStore) -> Result<usize> {
        *self.rebuild_buffer.lock() = Some(Vec::new());

        let count = match store.count().await {
            Ok(count) => count as usize,
            Err(e) => {
                self.stop_buffering();
                return Err(e);
            }
        };
        let capacity = calculate_capacity(self.capacity, count);
        let mut new_bloom = match new_bloom(capacity, self.fp_rate) {
            Ok(bloom) => bloom,
            Err(e) => {
                self.stop_buffering();
                return Err(e);
            }
        };

        let mut loaded = 0usize;
        let mut cursor = 0u64;
        loop {
            let page = match store.load_url_page(cursor, POPULATE_PAGE_SIZE).await {
                Ok(page) => page,
                Err(e) => {
                    // 旧 Bloom 和 ready 状态保持不变
                    self.stop_buffering();
                    return Err(e);
                }
            };
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.id;
            for entry in &page {
                new_bloom.set(entry.long_url.as_str());
            }
            loaded += page.len();
            if (page.len() as u64) < POPULATE_PAGE_SIZE {
                break;
            }
        }

        let buffered_count;
        {
            let mut buffer_guard = self.rebuild_buffer.lock();
            if let Some(ref pending) = *buffer_guard {
                buffered_count = pending.len();
                for key in pending {
                    new_bloom.set(key.as_str());
                }
            } else {
                buffered_count = 0;
            }
            *self.inner.write() = new_bloom;
            *buffer_guard = None;
        }
        self.ready.store(true, Ordering::Release);

        info!(
            "Bloom filter populated with {} urls ({} from buffer), capacity: {}, fp_rate: {}",
            loaded + buffered_count,
            buffered_count,
            capacity,
            self.fp_rate
        );
        debug!("Bloom filter ready");
        Ok(loaded)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn name(&self) -> &'static str {
        "bloom"
    }
}
