//! 短链 URL 的拼装与解析

use url::Url;

use crate::codec;
use crate::errors::{Result, SnaplinkError};

/// `"<base>/<code>"`，base 末尾的 `/` 会被去掉
pub fn build_short_url(base: &str, code: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), code)
}

/// 从完整短链中取出短码
///
/// 要求 http(s)、host（含端口）与 `expected_host` 一致、路径非空。
pub fn extract_code(short_url: &str, expected_host: &str) -> Result<String> {
    let parsed = Url::parse(short_url.trim())
        .map_err(|e| SnaplinkError::invalid_input(format!("Invalid URL format: {}", e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(SnaplinkError::invalid_input("Invalid URL format"));
    }

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(h), Some(p)) => format!("{}:{}", h, p),
        (Some(h), None) => h.to_string(),
        (None, _) => return Err(SnaplinkError::invalid_input("Invalid URL format")),
    };
    if !host.eq_ignore_ascii_case(expected_host) {
        return Err(SnaplinkError::invalid_input(
            "Invalid/Unrecognized short URL",
        ));
    }

    let code = parsed.path().trim_start_matches('/');
    if code.is_empty() {
        return Err(SnaplinkError::invalid_input(
            "Incomplete short URL: No short code found",
        ));
    }
    if !codec::is_well_formed(code) {
        return Err(SnaplinkError::invalid_code(format!(
            "Malformed short code: {}",
            code
        )));
    }
    Ok(code.to_string())
}
