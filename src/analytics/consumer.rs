//! 点击事件消费
//!
//! 订阅通道，每条消息派生一个任务写库，接收循环不等待写库完成。
//! 收到停止信号后不再接收新消息，等待在途任务（有上限）后返回统计。

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::{ClickEvent, ClickTransport};
use crate::errors::{Result, SnaplinkError};
use crate::storage::UrlStore;

/// consumer 退出时的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// 成功累加
    pub processed: u64,
    /// id 不存在，未产生任何写入
    pub unknown: u64,
    /// 无法解析，丢弃
    pub dropped: u64,
    /// 写库失败
    pub failed: u64,
    /// 停机超时被中止的在途任务
    pub aborted: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    unknown: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

pub struct ClickConsumer {
    transport: Arc<dyn ClickTransport>,
    store: Arc<dyn UrlStore>,
    channel: String,
    shutdown_timeout: Duration,
}

impl ClickConsumer {
    pub fn new(
        transport: Arc<dyn ClickTransport>,
        store: Arc<dyn UrlStore>,
        channel: impl Into<String>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            channel: channel.into(),
            shutdown_timeout,
        }
    }

    /// 先订阅，之后发布的事件都会被 `run_stream` 看到
    pub async fn subscribe(&self) -> Result<BoxStream<'static, String>> {
        let stream = self.transport.subscribe(&self.channel).await?;
        info!(
            "Click consumer subscribed to '{}' via {}",
            self.channel,
            self.transport.name()
        );
        Ok(stream)
    }

    /// 订阅并运行直到 `shutdown` 完成或通道关闭
    pub async fn run<S>(self, shutdown: S) -> Result<ConsumerReport>
    where
        S: Future<Output = ()> + Send,
    {
        let stream = self.subscribe().await?;
        Ok(self.run_stream(stream, shutdown).await)
    }

    pub async fn run_stream<S>(
        self,
        mut stream: BoxStream<'static, String>,
        shutdown: S,
    ) -> ConsumerReport
    where
        S: Future<Output = ()> + Send,
    {
        let counters = Arc::new(Counters::default());
        let mut tasks: JoinSet<()> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Click consumer received shutdown signal");
                    break;
                }
                message = stream.next() => {
                    let Some(payload) = message else {
                        warn!("Click channel '{}' closed", self.channel);
                        break;
                    };
                    let store = Arc::clone(&self.store);
                    let counters = Arc::clone(&counters);
                    tasks.spawn(async move {
                        handle_payload(store.as_ref(), &payload, &counters).await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Click handler task panicked: {}", e);
                    }
                }
            }
        }

        // 停止接收后排空在途任务
        drop(stream);
        let in_flight = tasks.len();
        if in_flight > 0 {
            debug!("Waiting for {} in-flight click updates", in_flight);
        }
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("Click handler task panicked: {}", e);
                }
            }
        })
        .await;

        let mut aborted = 0;
        if drained.is_err() {
            aborted = tasks.len() as u64;
            warn!(
                "Shutdown timeout ({:?}) reached, aborting {} click updates",
                self.shutdown_timeout, aborted
            );
            tasks.shutdown().await;
        }

        let report = ConsumerReport {
            processed: counters.processed.load(Ordering::Relaxed),
            unknown: counters.unknown.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            aborted,
        };
        info!("Click consumer stopped: {:?}", report);
        report
    }
}

async fn handle_payload(store: &dyn UrlStore, payload: &str, counters: &Counters) {
    let event = match ClickEvent::from_payload(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!("{}", e);
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    match store.record_click(event.id, event.timestamp).await {
        Ok(()) => {
            debug!("Click recorded: id={}", event.id);
            counters.processed.fetch_add(1, Ordering::Relaxed);
        }
        Err(SnaplinkError::NotFound(_)) => {
            debug!("Click for unknown id={} ignored", event.id);
            counters.unknown.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            error!("Failed to record click id={}: {}", event.id, e);
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::LocalClickTransport;
    use crate::storage::{InsertOutcome, UrlPageEntry, UrlStats};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use futures_util::stream;
    use parking_lot::Mutex;

    /// 只记录 record_click 调用的存储，id 1..=known 视为存在
    struct RecordingStore {
        known: u64,
        delay: Duration,
        clicks: Mutex<Vec<(u64, DateTime<Utc>)>>,
    }

    impl RecordingStore {
        fn new(known: u64, delay: Duration) -> Self {
            Self {
                known,
                delay,
                clicks: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UrlStore for RecordingStore {
        async fn insert_if_absent(&self, _: &str) -> Result<InsertOutcome> {
            unimplemented!()
        }
        async fn find_id_by_url(&self, _: &str) -> Result<Option<u64>> {
            Ok(None)
        }
        async fn find_url_by_id(&self, _: u64) -> Result<Option<String>> {
            Ok(None)
        }
        async fn record_click(&self, id: u64, visited_at: DateTime<Utc>) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            if id == 0 || id > self.known {
                return Err(SnaplinkError::not_found(format!("id {}", id)));
            }
            self.clicks.lock().push((id, visited_at));
            Ok(())
        }
        async fn fetch_stats(&self, _: u64) -> Result<Option<UrlStats>> {
            Ok(None)
        }
        async fn count(&self) -> Result<u64> {
            Ok(self.known)
        }
        async fn load_url_page(&self, _: u64, _: u64) -> Result<Vec<UrlPageEntry>> {
            Ok(Vec::new())
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
        fn backend_name(&self) -> &str {
            "recording"
        }
    }

    fn consumer(store: Arc<RecordingStore>, shutdown_timeout: Duration) -> ClickConsumer {
        ClickConsumer::new(
            Arc::new(LocalClickTransport::default()),
            store,
            "click_events",
            shutdown_timeout,
        )
    }

    fn payload(id: u64) -> String {
        ClickEvent::now(id).to_payload().unwrap()
    }

    #[tokio::test]
    async fn test_counts_each_outcome() {
        let store = Arc::new(RecordingStore::new(5, Duration::ZERO));
        let messages = vec![
            payload(1),
            payload(2),
            "{not json".to_string(),
            payload(42),
            r#"{"id":"x","timestamp":"2025-01-01T00:00:00Z"}"#.to_string(),
        ];

        // 通道耗尽后 consumer 退出并等待在途任务
        let report = consumer(Arc::clone(&store), Duration::from_secs(1))
            .run_stream(stream::iter(messages).boxed(), std::future::pending())
            .await;

        assert_eq!(
            report,
            ConsumerReport {
                processed: 2,
                unknown: 1,
                dropped: 2,
                failed: 0,
                aborted: 0,
            }
        );
        let mut ids: Vec<u64> = store.clicks.lock().iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_updates() {
        let store = Arc::new(RecordingStore::new(10, Duration::from_millis(100)));
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let messages = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|m| (m, rx))
        })
        .boxed();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(
            consumer(Arc::clone(&store), Duration::from_secs(5)).run_stream(messages, async {
                let _ = stop_rx.await;
            }),
        );

        for id in 1..=3 {
            tx.send(payload(id)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(()).unwrap();

        let report = handle.await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.aborted, 0);
        assert_eq!(store.clicks.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_timeout_aborts_slow_updates() {
        let store = Arc::new(RecordingStore::new(10, Duration::from_secs(30)));
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let messages = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|m| (m, rx))
        })
        .boxed();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(
            consumer(Arc::clone(&store), Duration::from_millis(50)).run_stream(messages, async {
                let _ = stop_rx.await;
            }),
        );

        tx.send(payload(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(()).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.aborted, 1);
    }
}
