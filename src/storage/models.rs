use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一条 URL 记录的统计视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlStats {
    pub id: u64,
    pub long_url: String,
    pub total_clicks: u64,
    pub last_visited: Option<DateTime<Utc>>,
}

/// `insert_if_absent` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: u64,
    /// 本次调用真正插入了新行
    pub created: bool,
}

/// 分页扫描时的一行（id 用作下一页游标）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPageEntry {
    pub id: u64,
    pub long_url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageInfo {
    pub storage_type: String,
    pub url_count: u64,
}
