pub mod health;
pub mod links;
pub mod redirect;

use actix_web::HttpRequest;
use url::Url;

pub use health::{AppStartTime, HealthService, health_routes};
pub use links::{LinkApi, link_routes};
pub use redirect::{RedirectService, redirect_routes};

/// 接口层的静态设置
#[derive(Clone, Debug, Default)]
pub struct ApiSettings {
    /// 对外短链前缀；为空时使用请求的 scheme 和 Host
    pub public_base_url: Option<String>,
}

impl ApiSettings {
    pub fn new(public_base_url: Option<String>) -> Self {
        Self {
            public_base_url: public_base_url
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
        }
    }

    pub fn base_url(&self, req: &HttpRequest) -> String {
        match &self.public_base_url {
            Some(base) => base.clone(),
            None => {
                let info = req.connection_info();
                format!("{}://{}", info.scheme(), info.host())
            }
        }
    }

    /// 短链中应当出现的 host（含非默认端口）
    pub fn expected_host(&self, req: &HttpRequest) -> String {
        let base = self.base_url(req);
        match Url::parse(&base) {
            Ok(parsed) => match (parsed.host_str(), parsed.port()) {
                (Some(h), Some(p)) => format!("{}:{}", h, p),
                (Some(h), None) => h.to_string(),
                (None, _) => base,
            },
            Err(_) => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_configured_base_url() {
        let settings = ApiSettings::new(Some("https://sho.rt:8443/".to_string()));
        let req = TestRequest::default().to_http_request();
        assert_eq!(settings.base_url(&req), "https://sho.rt:8443");
        assert_eq!(settings.expected_host(&req), "sho.rt:8443");
    }

    #[test]
    fn test_base_url_from_request() {
        let settings = ApiSettings::new(Some("   ".to_string()));
        let req = TestRequest::default()
            .insert_header(("host", "links.example"))
            .to_http_request();
        assert_eq!(settings.base_url(&req), "http://links.example");
        assert_eq!(settings.expected_host(&req), "links.example");
    }
}
