use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SnaplinkError};

/// 一次成功跳转
///
/// 线上格式：`{"id":42,"timestamp":"2025-01-01T00:00:00Z"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(id: u64, timestamp: DateTime<Utc>) -> Self {
        Self { id, timestamp }
    }

    pub fn now(id: u64) -> Self {
        Self::new(id, Utc::now())
    }

    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| {
            SnaplinkError::malformed_event(format!("cannot parse click event {:?}: {}", payload, e))
        })
    }
}
