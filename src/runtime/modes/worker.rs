//! Worker mode
//!
//! Standalone click consumer: subscribes to the click channel and folds
//! events into `urls.click_count` / `urls.last_visited_at`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::analytics::{ClickConsumer, create_click_transport};
use crate::config::{CacheBackendKind, ClickMode, get_config};
use crate::storage::{StorageFactory, UrlStore};
use crate::system::shutdown_signal;

pub async fn run_worker() -> Result<()> {
    let config = get_config();

    if config.cache.backend == CacheBackendKind::Memory {
        bail!(
            "The standalone worker needs a shared channel; set cache.backend = \"redis\" \
             (with the memory backend the server consumes its own click events)"
        );
    }
    if config.clicks.mode != ClickMode::Pubsub {
        warn!(
            "clicks.mode is {:?}; servers using this config will not publish events",
            config.clicks.mode
        );
    }

    let storage = StorageFactory::create(&config.database)
        .await
        .context("Failed to create storage backend")?;
    let transport =
        create_click_transport(&config.cache).context("Failed to create click transport")?;

    let consumer = ClickConsumer::new(
        transport,
        storage as Arc<dyn UrlStore>,
        config.clicks.channel.clone(),
        Duration::from_secs(config.clicks.shutdown_timeout_secs),
    );
    let stream = consumer
        .subscribe()
        .await
        .context("Failed to subscribe to click channel")?;
    info!("Click worker started, press Ctrl+C to stop");

    let report = consumer.run_stream(stream, shutdown_signal()).await;
    info!(
        "Click worker finished: {} processed, {} unknown, {} dropped, {} failed, {} aborted",
        report.processed, report.unknown, report.dropped, report.failed, report.aborted
    );
    Ok(())
}
