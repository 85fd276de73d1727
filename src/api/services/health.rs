use std::sync::Arc;
use std::time::Duration;

use actix_web::{HttpResponse, web};
use serde::Serialize;
use tracing::{error, trace, warn};

use crate::cache::kv::with_deadline;
use crate::services::LinkService;

// 应用启动时间
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct StorageCheck {
    pub status: &'static str,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheCheck {
    pub status: &'static str,
    pub backend: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FilterCheck {
    pub kind: &'static str,
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime: u64,
    pub storage: StorageCheck,
    pub cache: CacheCheck,
    pub filter: FilterCheck,
}

/// 存储不可用时整体 unhealthy；缓存和过滤器只影响性能，状态仅供参考
pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        service: web::Data<Arc<LinkService>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> HttpResponse {
        trace!("Received health check request");

        let store = service.store();
        let storage = match tokio::time::timeout(CHECK_TIMEOUT, store.count()).await {
            Ok(Ok(count)) => StorageCheck {
                status: "healthy",
                backend: store.backend_name().to_string(),
                url_count: Some(count),
                error: None,
            },
            Ok(Err(e)) => {
                error!("Storage health check failed: {}", e);
                StorageCheck {
                    status: "unhealthy",
                    backend: store.backend_name().to_string(),
                    url_count: None,
                    error: Some(e.error_type().to_string()),
                }
            }
            Err(_) => {
                error!("Storage health check timeout");
                StorageCheck {
                    status: "unhealthy",
                    backend: store.backend_name().to_string(),
                    url_count: None,
                    error: Some("timeout".to_string()),
                }
            }
        };

        let kv = service.cache().backend();
        let cache = match with_deadline(CHECK_TIMEOUT, kv.ping()).await {
            Ok(()) => CacheCheck {
                status: "healthy",
                backend: kv.name(),
            },
            Err(e) => {
                warn!("Cache health check failed: {}", e);
                CacheCheck {
                    status: "degraded",
                    backend: kv.name(),
                }
            }
        };

        let filter = FilterCheck {
            kind: service.filter().name(),
            ready: service.filter().is_ready(),
        };

        let now = chrono::Utc::now();
        let uptime = (now - app_start_time.start_datetime).num_seconds().max(0) as u64;
        let healthy = storage.status == "healthy";

        let body = HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            timestamp: now,
            uptime,
            storage,
            cache,
            filter,
        };

        if healthy {
            HttpResponse::Ok().json(body)
        } else {
            HttpResponse::ServiceUnavailable().json(body)
        }
    }
}

pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
}
