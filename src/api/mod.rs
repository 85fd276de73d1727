//! HTTP 接口
//!
//! 只做请求解析和响应组装，业务逻辑都在 `LinkService` 里。

pub mod error;
pub mod middleware;
pub mod services;

use actix_web::web;

pub use services::ApiSettings;

/// 注册全部路由；`/{code}` 必须最后注册，避免吞掉固定路径
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(services::health_routes())
        .configure(services::link_routes)
        .service(services::redirect_routes());
}
