//! 启动装配
//!
//! 按依赖顺序构建：存储 → KV 后端 → 热缓存 / 过滤器 → 点击通道 → LinkService → 限流器。
//! 每个组件都显式构造并由 `AppContext` 持有，没有全局单例。
//! 后台任务（内存 KV 清理、进程内 click consumer）挂在同一个 `ShutdownTrigger` 上。

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ShutdownTrigger;
use crate::analytics::{
    ClickConsumer, ClickTransport, ConsumerReport, create_click_publisher,
    create_click_transport,
};
use crate::cache::{HotCache, KvBackend, create_existence_filter, create_kv_backend};
use crate::config::{CacheBackendKind, ClickMode, StaticConfig};
use crate::ratelimit::RateLimiters;
use crate::services::LinkService;
use crate::storage::{SeaOrmStorage, StorageFactory, UrlStore};
use crate::utils::StandardUrlSafety;

pub struct AppContext {
    pub storage: Arc<SeaOrmStorage>,
    pub kv: Arc<dyn KvBackend>,
    pub transport: Arc<dyn ClickTransport>,
    pub link_service: Arc<LinkService>,
    pub rate_limiters: Arc<RateLimiters>,
    stop: ShutdownTrigger,
    click_worker: Option<JoinHandle<ConsumerReport>>,
}

impl AppContext {
    /// 与 `LinkService` 共用同一个点击通道的 consumer
    pub fn click_consumer(&self, config: &StaticConfig) -> ClickConsumer {
        ClickConsumer::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.storage) as Arc<dyn UrlStore>,
            config.clicks.channel.clone(),
            Duration::from_secs(config.clicks.shutdown_timeout_secs),
        )
    }

    /// 在当前进程里运行 click consumer，已在运行时什么都不做
    ///
    /// 先订阅再返回，之后发布的事件都不会丢。
    pub async fn spawn_click_worker(&mut self, config: &StaticConfig) -> Result<()> {
        if self.click_worker.is_some() {
            return Ok(());
        }
        let consumer = self.click_consumer(config);
        let stream = consumer
            .subscribe()
            .await
            .context("Failed to subscribe to click channel")?;
        self.click_worker = Some(tokio::spawn(
            consumer.run_stream(stream, self.stop.wait()),
        ));
        info!("Click worker running in this process");
        Ok(())
    }

    pub fn has_click_worker(&self) -> bool {
        self.click_worker.is_some()
    }

    /// 通知所有后台任务停止，并等待 click consumer 排空在途写入
    pub async fn shutdown(mut self) -> Option<ConsumerReport> {
        self.stop.trigger();
        let worker = self.click_worker.take()?;
        match worker.await {
            Ok(report) => {
                info!(
                    "Click worker finished: {} processed, {} unknown, {} dropped, {} failed, {} aborted",
                    report.processed, report.unknown, report.dropped, report.failed, report.aborted
                );
                Some(report)
            }
            Err(e) => {
                error!("Click worker task failed: {}", e);
                None
            }
        }
    }

    /// 从存储构建过滤器；失败只记录日志，过滤器保持放行状态
    pub async fn populate_filter(&self) {
        let start = Instant::now();
        match self.link_service.populate_filter().await {
            Ok(count) => info!(
                "Existence filter ready with {} URLs in {:?}",
                count,
                start.elapsed()
            ),
            Err(e) => warn!(
                "Existence filter population failed, serving without it: {}",
                e
            ),
        }
    }
}

pub async fn prepare_context(config: &StaticConfig) -> Result<AppContext> {
    let start_time = Instant::now();
    debug!("Preparing application context...");

    config.validate().context("Invalid configuration")?;

    let storage = StorageFactory::create(&config.database)
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());
    let store: Arc<dyn UrlStore> = storage.clone();

    let stop = ShutdownTrigger::new();
    let kv = create_kv_backend(&config.cache, stop.wait())
        .context("Failed to create KV backend")?;
    let op_timeout = Duration::from_millis(config.cache.op_timeout_ms);
    let cache = Arc::new(HotCache::new(
        Arc::clone(&kv),
        Duration::from_secs(config.cache.ttl_secs),
        op_timeout,
    ));

    let filter =
        create_existence_filter(&config.filter).context("Failed to create existence filter")?;
    debug!("Existence filter: {}", filter.name());

    let transport =
        create_click_transport(&config.cache).context("Failed to create click transport")?;
    let clicks = create_click_publisher(&config.clicks, Arc::clone(&transport), Arc::clone(&store));
    info!(
        "Click tracking mode: {} (channel '{}')",
        clicks.mode_name(),
        config.clicks.channel
    );

    let link_service = Arc::new(LinkService::new(
        store,
        filter,
        cache,
        Arc::new(StandardUrlSafety::default()),
        clicks,
    ));

    let rate_limiters = Arc::new(RateLimiters::from_config(
        &config.rate_limit,
        Arc::clone(&kv),
        op_timeout,
    ));
    if rate_limiters.is_enabled() {
        info!(
            "Rate limiting: global {}/{}s, per-client {}/{}s",
            config.rate_limit.global_limit,
            config.rate_limit.global_window_secs,
            config.rate_limit.per_client_limit,
            config.rate_limit.per_client_window_secs
        );
    } else {
        warn!("Rate limiting is disabled");
    }

    let mut ctx = AppContext {
        storage,
        kv,
        transport,
        link_service,
        rate_limiters,
        stop,
        click_worker: None,
    };

    // 进程内通道只有本进程能读到，consumer 必须和 server 在一起
    if config.clicks.mode == ClickMode::Pubsub && config.cache.backend == CacheBackendKind::Memory
    {
        ctx.spawn_click_worker(config).await?;
    }

    debug!("Application context ready in {:?}", start_time.elapsed());
    Ok(ctx)
}
