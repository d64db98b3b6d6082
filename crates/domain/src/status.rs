use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::value_objects::{StatusId, Timestamp, UserId};

/// 状态的存活窗口：超过 24 小时后在任何查询中都不再出现。
pub const STATUS_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    #[default]
    Text,
    Image,
}

/// 短时动态。过期在查询时过滤，不依赖后台清理。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    pub user_id: UserId,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub timestamp: Timestamp,
}

impl Status {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now - self.timestamp > Duration::hours(STATUS_TTL_HOURS)
    }
}

/// 对外广播的状态条目，附带作者当前资料。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub status: Status,
    pub username: String,
    pub avatar: String,
}
