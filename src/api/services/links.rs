//! 缩短、预览、统计接口

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::ApiSettings;
use crate::errors::SnaplinkError;
use crate::services::LinkService;
use crate::storage::UrlStats;
use crate::utils::extract_code;

/// 所有接口共用的请求体，支持 JSON 和表单
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: String,
}

type UrlPayload = web::Either<web::Json<UrlRequest>, web::Form<UrlRequest>>;

fn payload_url(payload: UrlPayload) -> String {
    match payload {
        web::Either::Left(json) => json.into_inner().url,
        web::Either::Right(form) => form.into_inner().url,
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub short_url: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub long_url: String,
}

/// `last_visited` 为 RFC 3339 时间，从未访问时为 `"Never"`
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub long_url: String,
    pub total_clicks: u64,
    pub last_visited: String,
}

impl From<UrlStats> for StatsResponse {
    fn from(stats: UrlStats) -> Self {
        Self {
            long_url: stats.long_url,
            total_clicks: stats.total_clicks,
            last_visited: stats
                .last_visited
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "Never".to_string()),
        }
    }
}

pub struct LinkApi;

impl LinkApi {
    pub async fn shorten(
        req: HttpRequest,
        payload: UrlPayload,
        service: web::Data<Arc<LinkService>>,
        settings: web::Data<ApiSettings>,
    ) -> Result<HttpResponse, SnaplinkError> {
        let long_url = payload_url(payload);
        let outcome = service.shorten(&long_url).await?;
        let short_url = service.short_url(&settings.base_url(&req), &outcome.code);
        trace!("Shortened {} -> {}", long_url.trim(), short_url);

        Ok(HttpResponse::Created().json(ShortenResponse {
            short_url,
            code: outcome.code,
        }))
    }

    pub async fn preview(
        req: HttpRequest,
        payload: UrlPayload,
        service: web::Data<Arc<LinkService>>,
        settings: web::Data<ApiSettings>,
    ) -> Result<HttpResponse, SnaplinkError> {
        let code = Self::code_from_payload(&req, payload, &settings)?;
        let long_url = service.preview(&code).await?;
        Ok(HttpResponse::Ok().json(PreviewResponse { long_url }))
    }

    pub async fn track_clicks(
        req: HttpRequest,
        payload: UrlPayload,
        service: web::Data<Arc<LinkService>>,
        settings: web::Data<ApiSettings>,
    ) -> Result<HttpResponse, SnaplinkError> {
        let code = Self::code_from_payload(&req, payload, &settings)?;
        let stats = service.stats(&code).await?;
        Ok(HttpResponse::Ok().json(StatsResponse::from(stats)))
    }

    fn code_from_payload(
        req: &HttpRequest,
        payload: UrlPayload,
        settings: &ApiSettings,
    ) -> Result<String, SnaplinkError> {
        let short_url = payload_url(payload);
        if short_url.trim().is_empty() {
            return Err(SnaplinkError::invalid_input("URL cannot be empty"));
        }
        extract_code(&short_url, &settings.expected_host(req))
    }
}

/// 用 resource 而不是 `scope("")` 注册，未匹配的路径才能落到跳转路由
pub fn link_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/shorten-url").route(web::post().to(LinkApi::shorten)))
        .service(web::resource("/preview-url").route(web::post().to(LinkApi::preview)))
        .service(web::resource("/track-clicks").route(web::post().to(LinkApi::track_clicks)));
}
