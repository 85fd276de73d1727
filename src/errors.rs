use std::fmt;

/// 服务错误分类
///
/// 加速层（filter / cache / 限流后端）的失败在本地吸收，不会以错误形式到达调用方；
/// 存储与输入校验错误向上传播。
#[derive(Debug, Clone)]
pub enum SnaplinkError {
    InvalidInput(String),
    InvalidCode(String),
    Unsafe(String),
    NotFound(String),
    StorageUnavailable(String),
    CacheUnavailable(String),
    RateLimited(String),
    MalformedEvent(String),
    Transport(String),
    Config(String),
    Serialization(String),
}

impl SnaplinkError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            SnaplinkError::InvalidInput(_) => "E001",
            SnaplinkError::InvalidCode(_) => "E002",
            SnaplinkError::Unsafe(_) => "E003",
            SnaplinkError::NotFound(_) => "E004",
            SnaplinkError::StorageUnavailable(_) => "E005",
            SnaplinkError::CacheUnavailable(_) => "E006",
            SnaplinkError::RateLimited(_) => "E007",
            SnaplinkError::MalformedEvent(_) => "E008",
            SnaplinkError::Transport(_) => "E009",
            SnaplinkError::Config(_) => "E010",
            SnaplinkError::Serialization(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            SnaplinkError::InvalidInput(_) => "Invalid Input",
            SnaplinkError::InvalidCode(_) => "Invalid Short Code",
            SnaplinkError::Unsafe(_) => "Unsafe URL",
            SnaplinkError::NotFound(_) => "Resource Not Found",
            SnaplinkError::StorageUnavailable(_) => "Storage Unavailable",
            SnaplinkError::CacheUnavailable(_) => "Cache Unavailable",
            SnaplinkError::RateLimited(_) => "Rate Limited",
            SnaplinkError::MalformedEvent(_) => "Malformed Event",
            SnaplinkError::Transport(_) => "Transport Error",
            SnaplinkError::Config(_) => "Configuration Error",
            SnaplinkError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            SnaplinkError::InvalidInput(msg)
            | SnaplinkError::InvalidCode(msg)
            | SnaplinkError::Unsafe(msg)
            | SnaplinkError::NotFound(msg)
            | SnaplinkError::StorageUnavailable(msg)
            | SnaplinkError::CacheUnavailable(msg)
            | SnaplinkError::RateLimited(msg)
            | SnaplinkError::MalformedEvent(msg)
            | SnaplinkError::Transport(msg)
            | SnaplinkError::Config(msg)
            | SnaplinkError::Serialization(msg) => msg,
        }
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            SnaplinkError::InvalidInput(_)
            | SnaplinkError::InvalidCode(_)
            | SnaplinkError::Unsafe(_)
            | SnaplinkError::MalformedEvent(_) => 400,
            SnaplinkError::NotFound(_) => 404,
            SnaplinkError::RateLimited(_) => 429,
            SnaplinkError::Transport(_) => 502,
            SnaplinkError::CacheUnavailable(_) => 503,
            SnaplinkError::StorageUnavailable(_)
            | SnaplinkError::Config(_)
            | SnaplinkError::Serialization(_) => 500,
        }
    }

    /// 客户端错误（4xx）不应重试
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// 格式化为彩色输出（用于启动失败等终端场景）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for SnaplinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for SnaplinkError {}

// 便捷的构造函数
impl SnaplinkError {
    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::InvalidInput(msg.into())
    }

    pub fn invalid_code<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::InvalidCode(msg.into())
    }

    pub fn unsafe_url<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::Unsafe(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::NotFound(msg.into())
    }

    pub fn storage_unavailable<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::StorageUnavailable(msg.into())
    }

    pub fn cache_unavailable<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::CacheUnavailable(msg.into())
    }

    pub fn rate_limited<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::RateLimited(msg.into())
    }

    pub fn malformed_event<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::MalformedEvent(msg.into())
    }

    pub fn transport<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::Transport(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::Config(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::Serialization(msg.into())
    }
}

impl From<sea_orm::DbErr> for SnaplinkError {
    fn from(err: sea_orm::DbErr) -> Self {
        SnaplinkError::StorageUnavailable(err.to_string())
    }
}

impl From<redis::RedisError> for SnaplinkError {
    fn from(err: redis::RedisError) -> Self {
        SnaplinkError::CacheUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for SnaplinkError {
    fn from(err: serde_json::Error) -> Self {
        SnaplinkError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for SnaplinkError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SnaplinkError::CacheUnavailable("operation timed out".to_string())
    }
}

pub type Result<T> = std::result::Result<T, SnaplinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(SnaplinkError::invalid_input("x").status_code(), 400);
        assert_eq!(SnaplinkError::invalid_code("x").status_code(), 400);
        assert_eq!(SnaplinkError::unsafe_url("x").status_code(), 400);
        assert_eq!(SnaplinkError::not_found("x").status_code(), 404);
        assert_eq!(SnaplinkError::rate_limited("x").status_code(), 429);
        assert_eq!(SnaplinkError::storage_unavailable("x").status_code(), 500);
    }

    #[test]
    fn test_client_errors() {
        assert!(SnaplinkError::not_found("gone").is_client_error());
        assert!(!SnaplinkError::storage_unavailable("db down").is_client_error());
    }

    #[test]
    fn test_display_uses_simple_format() {
        let err = SnaplinkError::not_found("code abc");
        assert_eq!(err.to_string(), "Resource Not Found: code abc");
        assert_eq!(err.code(), "E004");
    }

    #[test]
    fn test_db_error_maps_to_storage_unavailable() {
        let err: SnaplinkError = sea_orm::DbErr::Custom("boom".into()).into();
        assert!(matches!(err, SnaplinkError::StorageUnavailable(_)));
    }
}
