pub mod ip;
pub mod short_url;
pub mod url_validator;

use sha2::{Digest, Sha256};

pub use short_url::{build_short_url, extract_code};
pub use url_validator::{StandardUrlSafety, UrlSafety, validate_url};

/// URL 的 SHA-256 十六进制摘要，用作缓存 key 的一部分
pub fn hash_url(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}
