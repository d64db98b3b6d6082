//! 状态（24 小时动态）广播
//!
//! 发布后重新查询当前有效状态并全员广播；过期只在查询时过滤，
//! 没有后台清理任务。条目用作者当前资料增强，作者已删除则用
//! 占位名兜底。

use std::sync::Arc;

use chrono::Duration;

use domain::{
    ConnectionId, DomainError, ServerEvent, Status, StatusId, StatusKind, StatusStore, StatusView,
    UserId, DEFAULT_USERNAME, STATUS_TTL_HOURS,
};

use crate::clock::Clock;
use crate::outbound::ConnectionRegistry;
use crate::roster::RosterCache;

pub struct StatusBroadcasterDependencies {
    pub roster: Arc<RosterCache>,
    pub outbound: Arc<ConnectionRegistry>,
    pub statuses: Arc<dyn StatusStore>,
    pub clock: Arc<dyn Clock>,
}

pub struct StatusBroadcaster {
    deps: StatusBroadcasterDependencies,
}

impl StatusBroadcaster {
    pub fn new(deps: StatusBroadcasterDependencies) -> Self {
        Self { deps }
    }

    /// 发布状态：服务端时间戳落库，然后广播最新列表。
    /// 落库失败只记日志，广播照常进行。
    pub async fn publish(&self, id: StatusId, user_id: UserId, content: String, kind: StatusKind) {
        let status = Status {
            id,
            user_id: user_id.clone(),
            content,
            kind,
            timestamp: self.deps.clock.now(),
        };
        if let Err(err) = self.deps.statuses.save(status).await {
            tracing::warn!(user_id = %user_id, error = %err, "status persist failed");
        }

        let views = self.current_views().await;
        self.deps
            .outbound
            .broadcast_all(ServerEvent::StatusUpdate { statuses: views })
            .await;
    }

    /// 单播当前有效状态给请求连接。
    pub async fn request_all(&self, origin: ConnectionId) {
        let views = self.current_views().await;
        self.deps
            .outbound
            .send_to_connection(origin, ServerEvent::StatusUpdate { statuses: views })
            .await;
    }

    /// 删除状态：作者本人、名册管理员或管理通道可删，随后全员重播。
    pub async fn delete(
        &self,
        status_id: StatusId,
        requester_id: UserId,
        admin_channel: bool,
    ) -> Result<(), DomainError> {
        let status = match self.deps.statuses.get(&status_id).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                return Err(DomainError::not_found("status", status_id.as_str()));
            }
            Err(err) => {
                tracing::warn!(error = %err, "status lookup failed during delete");
                return Ok(());
            }
        };

        let requester_is_admin = admin_channel
            || self
                .deps
                .roster
                .get(&requester_id)
                .await
                .is_some_and(|u| u.is_admin());
        if status.user_id != requester_id && !requester_is_admin {
            return Err(DomainError::permission_denied("delete_status"));
        }

        if let Err(err) = self.deps.statuses.delete(&status_id).await {
            tracing::warn!(error = %err, "status delete failed");
        }

        let views = self.current_views().await;
        self.deps
            .outbound
            .broadcast_all(ServerEvent::StatusUpdate { statuses: views })
            .await;
        Ok(())
    }

    /// 过期窗口内的状态，按查询时刻过滤并增强作者资料。
    async fn current_views(&self) -> Vec<StatusView> {
        let now = self.deps.clock.now();
        let cutoff = now - Duration::hours(STATUS_TTL_HOURS);
        let statuses = match self.deps.statuses.recent(cutoff).await {
            Ok(statuses) => statuses,
            Err(err) => {
                tracing::warn!(error = %err, "status query failed, returning empty");
                return Vec::new();
            }
        };

        let mut views = Vec::with_capacity(statuses.len());
        for status in statuses {
            if status.is_expired(now) {
                continue;
            }
            let (username, avatar) = match self.deps.roster.get(&status.user_id).await {
                Some(author) => (author.username, author.avatar),
                None => (DEFAULT_USERNAME.to_string(), String::new()),
            };
            views.push(StatusView {
                status,
                username,
                avatar,
            });
        }
        views
    }
}
