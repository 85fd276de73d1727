use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::http::header::{CACHE_CONTROL, LOCATION};
use actix_web::{HttpResponse, web};
use tracing::trace;

use crate::errors::SnaplinkError;
use crate::services::LinkService;

pub struct RedirectService;

impl RedirectService {
    /// `GET /{code}` → 302；未知或格式错误的短码统一 404
    pub async fn handle_redirect(
        path: web::Path<String>,
        service: web::Data<Arc<LinkService>>,
    ) -> Result<HttpResponse, SnaplinkError> {
        let code = path.into_inner();
        let long_url = service.resolve(&code).await?;
        trace!("Redirect {} -> {}", code, long_url);

        Ok(Self::found(long_url))
    }

    /// `HEAD /{code}`：同样的响应头，但不计点击（预览爬虫、可用性检查）
    pub async fn handle_head(
        path: web::Path<String>,
        service: web::Data<Arc<LinkService>>,
    ) -> Result<HttpResponse, SnaplinkError> {
        let code = path.into_inner();
        let long_url = service.preview(&code).await?;
        Ok(Self::found(long_url))
    }

    fn found(long_url: String) -> HttpResponse {
        HttpResponse::build(StatusCode::FOUND)
            .insert_header((LOCATION, long_url))
            .insert_header((CACHE_CONTROL, "no-store"))
            .finish()
    }
}

pub fn redirect_routes() -> actix_web::Scope {
    web::scope("")
        .route("/{code}", web::get().to(RedirectService::handle_redirect))
        .route("/{code}", web::head().to(RedirectService::handle_head))
}
