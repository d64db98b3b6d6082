//! 出站扇出
//!
//! 每个连接注册一个无界发送端，所有写操作通过命令帧统一走
//! 发送任务；管理通道是一组被标记的连接，对应原有的管理员房间。

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, RwLock};

use domain::{ConnectionId, ServerEvent};

use crate::presence::PresenceRegistry;
use crate::roster::RosterCache;

/// 发往单个连接的命令帧。
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Event(ServerEvent),
    /// 要求连接任务收尾并关闭底层 socket
    Close,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<OutboundFrame>>>,
    admin_channels: RwLock<HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<OutboundFrame>,
    ) {
        self.senders.write().await.insert(connection_id, sender);
    }

    pub async fn unregister(&self, connection_id: ConnectionId) {
        self.senders.write().await.remove(&connection_id);
        self.admin_channels.write().await.remove(&connection_id);
    }

    /// 将连接并入管理通道，之后会收到 `admin_user_list` 推送。
    pub async fn mark_admin(&self, connection_id: ConnectionId) {
        self.admin_channels.write().await.insert(connection_id);
    }

    pub async fn is_admin_channel(&self, connection_id: ConnectionId) -> bool {
        self.admin_channels.read().await.contains(&connection_id)
    }

    pub async fn send_to_connection(&self, connection_id: ConnectionId, event: ServerEvent) {
        let senders = self.senders.read().await;
        if let Some(sender) = senders.get(&connection_id) {
            if sender.send(OutboundFrame::Event(event)).is_err() {
                tracing::debug!(connection_id = %connection_id, "outbound channel closed");
            }
        }
    }

    pub async fn send_to_connections(&self, connections: &[ConnectionId], event: ServerEvent) {
        let senders = self.senders.read().await;
        for connection_id in connections {
            if let Some(sender) = senders.get(connection_id) {
                if sender.send(OutboundFrame::Event(event.clone())).is_err() {
                    tracing::debug!(connection_id = %connection_id, "outbound channel closed");
                }
            }
        }
    }

    pub async fn broadcast_all(&self, event: ServerEvent) {
        let senders = self.senders.read().await;
        for (connection_id, sender) in senders.iter() {
            if sender.send(OutboundFrame::Event(event.clone())).is_err() {
                tracing::debug!(connection_id = %connection_id, "outbound channel closed");
            }
        }
    }

    pub async fn broadcast_admins(&self, event: ServerEvent) {
        let admins = self.admin_channels.read().await.clone();
        let senders = self.senders.read().await;
        for connection_id in admins {
            if let Some(sender) = senders.get(&connection_id) {
                let _ = sender.send(OutboundFrame::Event(event.clone()));
            }
        }
    }

    /// 强制关闭一个连接（发送关闭命令，由连接任务完成清理）。
    pub async fn close_connection(&self, connection_id: ConnectionId) {
        let senders = self.senders.read().await;
        if let Some(sender) = senders.get(&connection_id) {
            let _ = sender.send(OutboundFrame::Close);
        }
    }
}

/// 名册变更后的统一广播：全员 `user_list` 与 `online_count`，
/// 管理通道额外收到 `admin_user_list`。快照每次现算。
pub async fn broadcast_roster(
    roster: &RosterCache,
    presence: &PresenceRegistry,
    outbound: &ConnectionRegistry,
) {
    let users = roster.snapshot(presence).await;
    let count = presence.online_count().await;

    outbound
        .broadcast_admins(ServerEvent::AdminUserList {
            users: users.clone(),
        })
        .await;
    outbound.broadcast_all(ServerEvent::UserList { users }).await;
    outbound
        .broadcast_all(ServerEvent::OnlineCount { count })
        .await;
}
