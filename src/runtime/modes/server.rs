//! Server mode
//!
//! Builds the application context, populates the existence filter, then
//! serves HTTP until a shutdown signal arrives.

use std::time::Duration;

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::api::middleware::RequestIdMiddleware;
use crate::api::services::AppStartTime;
use crate::api::{ApiSettings, configure_routes};
use crate::config::get_config;
use crate::ratelimit::RateLimit;
use crate::runtime::lifetime::prepare_context;
use crate::system::shutdown_signal;

/// 请求体上限，只有一个 URL 字段
const MAX_PAYLOAD_BYTES: usize = 16 * 1024;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(with_worker: bool) -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };
    let config = get_config();

    let mut ctx = prepare_context(&config).await.map_err(|e| {
        error!("Server startup failed: {:#}", e);
        e
    })?;
    ctx.populate_filter().await;

    if with_worker {
        ctx.spawn_click_worker(&config).await?;
    }

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let settings = ApiSettings::new(config.server.public_base_url.clone());
    let link_service = ctx.link_service.clone();
    let rate_limiters = ctx.rate_limiters.clone();

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(RateLimit::new(rate_limiters.clone()))
            .wrap(RequestIdMiddleware) // 最外层，限流日志也带 request_id
            .app_data(web::Data::new(link_service.clone()))
            .app_data(web::Data::new(settings.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
            .configure(configure_routes)
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .client_disconnect_timeout(Duration::from_millis(1000))
    .workers(cpu_count)
    .disable_signals()
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    warn!("Starting server at http://{}", bind_address);
    let handle = server.handle();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => {
            res.context("HTTP server error")?;
        }
        _ = shutdown_signal() => {
            info!("Stopping HTTP server...");
            handle.stop(true).await;
        }
    }

    ctx.shutdown().await;

    warn!("Graceful shutdown complete");
    Ok(())
}
