//! URL 验证模块
//!
//! 语法检查（协议、host）加可选的 SSRF 检查（解析 host，拒绝内网地址）

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::errors::{Result, SnaplinkError};
use crate::utils::ip::is_internal;

/// 长链接最大长度，与 urls.long_url 列宽一致
pub const MAX_URL_LEN: usize = 2048;

/// 危险协议列表
const DANGEROUS_PROTOCOLS: &[&str] = &[
    "javascript:",
    "data:",
    "file:",
    "vbscript:",
    "about:",
    "blob:",
];

/// 语法层面的 URL 校验
///
/// 检查项目：
/// 1. URL 不为空且不超长
/// 2. 不是危险协议（javascript:, data:, file: 等）
/// 3. 必须是 http:// 或 https://
/// 4. 可以解析且带 host
pub fn validate_url(url: &str) -> Result<Url> {
    let url = url.trim();

    if url.is_empty() {
        return Err(SnaplinkError::invalid_input("URL cannot be empty"));
    }
    if url.len() > MAX_URL_LEN {
        return Err(SnaplinkError::invalid_input(format!(
            "URL too long: {} > {} characters",
            url.len(),
            MAX_URL_LEN
        )));
    }

    let url_lower = url.to_lowercase();
    for proto in DANGEROUS_PROTOCOLS {
        if url_lower.starts_with(proto) {
            return Err(SnaplinkError::unsafe_url(format!(
                "Dangerous protocol blocked: {}",
                proto
            )));
        }
    }

    if !url_lower.starts_with("http://") && !url_lower.starts_with("https://") {
        return Err(SnaplinkError::invalid_input(
            "URL must start with http:// or https://",
        ));
    }

    let parsed = Url::parse(url)
        .map_err(|e| SnaplinkError::invalid_input(format!("Invalid URL format: {}", e)))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(SnaplinkError::invalid_input("URL must contain a host"));
    }
    Ok(parsed)
}

/// URL 安全性判断（黑盒谓词）
#[async_trait]
pub trait UrlSafety: Send + Sync {
    /// 不安全时返回 `Unsafe` 或 `InvalidInput`
    async fn check(&self, url: &str) -> Result<()>;

    async fn is_safe(&self, url: &str) -> bool {
        self.check(url).await.is_ok()
    }
}

/// DNS 解析的默认期限
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(2);

/// 默认实现：语法校验 + 可选 DNS 解析后拒绝回环/私有地址
#[derive(Debug, Clone)]
pub struct StandardUrlSafety {
    resolve_dns: bool,
    dns_timeout: Duration,
}

impl StandardUrlSafety {
    pub fn new(resolve_dns: bool) -> Self {
        Self {
            resolve_dns,
            dns_timeout: DEFAULT_DNS_TIMEOUT,
        }
    }

    pub fn with_dns_timeout(mut self, dns_timeout: Duration) -> Self {
        self.dns_timeout = dns_timeout;
        self
    }

    /// 只做语法检查和字面 IP 检查，不查 DNS
    pub fn offline() -> Self {
        Self::new(false)
    }
}

impl Default for StandardUrlSafety {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl UrlSafety for StandardUrlSafety {
    async fn check(&self, url: &str) -> Result<()> {
        let parsed = validate_url(url)?;

        let host = match parsed.host() {
            Some(url::Host::Ipv4(v4)) => {
                return reject_internal(&IpAddr::V4(v4));
            }
            Some(url::Host::Ipv6(v6)) => {
                return reject_internal(&IpAddr::V6(v6));
            }
            Some(url::Host::Domain(domain)) => domain.to_string(),
            None => return Err(SnaplinkError::invalid_input("URL must contain a host")),
        };

        if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
            return Err(SnaplinkError::unsafe_url("Loopback host blocked"));
        }

        if !self.resolve_dns {
            return Ok(());
        }

        let port = parsed.port_or_known_default().unwrap_or(80);
        check_resolved(
            &host,
            self.dns_timeout,
            tokio::net::lookup_host((host.as_str(), port)),
        )
        .await
    }
}

/// 在期限内解析 host 并拒绝内网地址；解析失败、超时或无结果都按不安全处理
async fn check_resolved<F, I>(host: &str, deadline: Duration, lookup: F) -> Result<()>
where
    F: Future<Output = io::Result<I>>,
    I: Iterator<Item = SocketAddr>,
{
    let addrs = match tokio::time::timeout(deadline, lookup).await {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => {
            debug!("DNS lookup for {} failed: {}", host, e);
            return Err(SnaplinkError::unsafe_url(format!(
                "Host does not resolve: {}",
                host
            )));
        }
        Err(_) => {
            debug!("DNS lookup for {} exceeded {:?}", host, deadline);
            return Err(SnaplinkError::unsafe_url(format!(
                "Host lookup timed out: {}",
                host
            )));
        }
    };

    let mut resolved = false;
    for addr in addrs {
        resolved = true;
        reject_internal(&addr.ip())?;
    }
    if !resolved {
        return Err(SnaplinkError::unsafe_url(format!(
            "Host does not resolve: {}",
            host
        )));
    }
    Ok(())
}

fn reject_internal(ip: &IpAddr) -> Result<()> {
    if is_internal(ip) {
        Err(SnaplinkError::unsafe_url(format!(
            "Internal address blocked: {}",
            ip
        )))
    } else {
        Ok(())
    }
}
