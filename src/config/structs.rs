use serde::{Deserialize, Serialize};

use crate::errors::{Result, SnaplinkError};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 监听地址、端口、worker 数量、对外短链域名
/// - database: 数据库连接与重试
/// - cache: 热缓存与限流共用的 KV 后端
/// - filter: 存在性过滤器（Bloom）
/// - rate_limit: 全局固定窗口 + 按客户端滑动窗口
/// - clicks: 点击事件管道
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub clicks: ClicksConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > 配置文件 > 默认值
    /// ENV 前缀：SL，分隔符：__
    /// 示例：SL__SERVER__PORT=9999
    pub fn load(path: &str) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                if std::path::Path::new(path).exists() {
                    eprintln!("[INFO] Configuration loaded from: {}", path);
                }
                config
            }
            Err(e) => {
                eprintln!("[ERROR] {}", e);
                Self::default()
            }
        }
    }

    /// 同 `load`，但把解析错误返回给调用方
    pub fn try_load(path: &str) -> Result<Self> {
        use config::{Config, Environment, File};

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SnaplinkError::config(format!("Failed to build config: {}", e)))?;

        let config = settings
            .try_deserialize::<StaticConfig>()
            .map_err(|e| SnaplinkError::config(format!("Failed to deserialize config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// 基本合法性检查，值为 0 的窗口或容量会让限流/过滤器失去意义
    pub fn validate(&self) -> Result<()> {
        if self.filter.enabled && self.filter.capacity == 0 {
            return Err(SnaplinkError::config("filter.capacity must be > 0"));
        }
        if !(self.filter.fp_rate > 0.0 && self.filter.fp_rate < 1.0) {
            return Err(SnaplinkError::config(format!(
                "filter.fp_rate must be in (0, 1), got {}",
                self.filter.fp_rate
            )));
        }
        if self.rate_limit.global_window_secs == 0 || self.rate_limit.per_client_window_secs == 0 {
            return Err(SnaplinkError::config("rate limit windows must be > 0"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(SnaplinkError::config("cache.ttl_secs must be > 0"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(SnaplinkError::config("cache.sweep_interval_secs must be > 0"));
        }
        if self.clicks.channel.trim().is_empty() {
            return Err(SnaplinkError::config("clicks.channel must not be empty"));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 对外短链前缀，例如 `https://sho.rt`；为空时根据请求的 Host 推导
    #[serde(default)]
    pub public_base_url: Option<String>,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// KV 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
}

/// 热缓存配置（限流计数器共用同一个后端）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// 单次 KV 操作的超时，超时视为该层不可用
    #[serde(default = "default_cache_op_timeout_ms")]
    pub op_timeout_ms: u64,
    /// 内存后端清理过期 key 的周期
    #[serde(default = "default_cache_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

/// 存在性过滤器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_filter_capacity")]
    pub capacity: usize,
    #[serde(default = "default_filter_fp_rate")]
    pub fp_rate: f64,
}

/// 限流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_global_limit")]
    pub global_limit: u64,
    #[serde(default = "default_window_secs")]
    pub global_window_secs: u64,
    #[serde(default = "default_per_client_limit")]
    pub per_client_limit: u64,
    #[serde(default = "default_window_secs")]
    pub per_client_window_secs: u64,
}

/// 点击事件投递方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClickMode {
    /// 发布到 pub/sub 通道，由 worker 聚合
    #[default]
    Pubsub,
    /// 在后台任务里直接写数据库
    Inline,
    /// 不统计点击
    Disabled,
}

/// 点击管道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClicksConfig {
    #[serde(default)]
    pub mode: ClickMode,
    #[serde(default = "default_click_channel")]
    pub channel: String,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_true")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_true() -> bool {
    true
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "sqlite://urls.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    5
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_cache_ttl() -> u64 {
    86400
}

fn default_cache_op_timeout_ms() -> u64 {
    500
}

fn default_cache_sweep_interval() -> u64 {
    60
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_key_prefix() -> String {
    "snaplink:".to_string()
}

fn default_filter_capacity() -> usize {
    1_000_000
}

fn default_filter_fp_rate() -> f64 {
    0.01
}

fn default_global_limit() -> u64 {
    50
}

fn default_per_client_limit() -> u64 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_click_channel() -> String {
    "click_events".to_string()
}

fn default_publish_timeout_ms() -> u64 {
    2000
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            public_base_url: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            ttl_secs: default_cache_ttl(),
            op_timeout_ms: default_cache_op_timeout_ms(),
            sweep_interval_secs: default_cache_sweep_interval(),
            redis: RedisConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_filter_capacity(),
            fp_rate: default_filter_fp_rate(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_limit: default_global_limit(),
            global_window_secs: default_window_secs(),
            per_client_limit: default_per_client_limit(),
            per_client_window_secs: default_window_secs(),
        }
    }
}

impl Default for ClicksConfig {
    fn default() -> Self {
        Self {
            mode: ClickMode::default(),
            channel: default_click_channel(),
            publish_timeout_ms: default_publish_timeout_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: true,
        }
    }
}
