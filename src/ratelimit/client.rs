//! 客户端标识提取
//!
//! 优先级：`X-Forwarded-For` 第一项 → `X-Real-IP` 第一项 → 连接对端地址。

use std::net::SocketAddr;

use actix_web::dev::ServiceRequest;
use actix_web::http::header::HeaderMap;

/// 拿不到任何地址时使用的标识，所有此类请求共享一个窗口
pub const UNKNOWN_CLIENT: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    first_header_entry(headers, X_FORWARDED_FOR)
        .or_else(|| first_header_entry(headers, X_REAL_IP))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn client_identity_from_request(req: &ServiceRequest) -> String {
    client_identity(req.headers(), req.peer_addr())
}

/// 逗号分隔的 header 取第一个非空项
fn first_header_entry(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
