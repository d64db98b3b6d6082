//! 在线状态登记表
//!
//! 连接与用户的内存映射，是“在线”判定的唯一权威。一个用户可以
//! 同时持有多个连接；不做任何持久化，进程重启后所有人离线。

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use domain::{ConnectionId, UserId};

#[derive(Default)]
pub struct PresenceRegistry {
    connections: RwLock<HashMap<ConnectionId, UserId>>,
    user_connections: RwLock<HashMap<UserId, HashSet<ConnectionId>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, user_id: UserId, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        let mut user_connections = self.user_connections.write().await;

        connections.insert(connection_id, user_id.clone());
        user_connections
            .entry(user_id)
            .or_default()
            .insert(connection_id);
    }

    /// 移除一个连接，返回其关联的用户（若有）。
    /// 用户的其他连接不受影响。
    pub async fn remove(&self, connection_id: ConnectionId) -> Option<UserId> {
        let mut connections = self.connections.write().await;
        let mut user_connections = self.user_connections.write().await;

        let user_id = connections.remove(&connection_id)?;
        if let Some(conns) = user_connections.get_mut(&user_id) {
            conns.remove(&connection_id);
            if conns.is_empty() {
                user_connections.remove(&user_id);
            }
        }
        Some(user_id)
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.user_connections.read().await.contains_key(user_id)
    }

    /// 在线的去重用户数（不是连接数）。
    pub async fn online_count(&self) -> usize {
        self.user_connections.read().await.len()
    }

    pub async fn connections_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.user_connections
            .read()
            .await
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn online_user_ids(&self) -> HashSet<UserId> {
        self.user_connections.read().await.keys().cloned().collect()
    }
}
