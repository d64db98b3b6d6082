//! 名册缓存
//!
//! userId → 用户资料的内存映射，活跃会话的权威视图。启动时从
//! 持久层尽力水合，之后随接入/编辑/删除同步变更；持久层是滞后
//! 镜像，这里的内容决定路由与权限判定。

use std::collections::HashMap;

use tokio::sync::RwLock;

use domain::{Role, RosterEntry, User, UserId, UserPatch};

use crate::presence::PresenceRegistry;

#[derive(Default)]
pub struct RosterCache {
    users: RwLock<HashMap<UserId, User>>,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动时的尽力水合，整体替换现有内容。
    pub async fn hydrate(&self, users: Vec<User>) {
        let mut map = self.users.write().await;
        map.clear();
        for user in users {
            map.insert(user.id.clone(), user);
        }
    }

    pub async fn get(&self, id: &UserId) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    pub async fn get_by_number(&self, number: &str) -> Option<User> {
        if number.is_empty() {
            return None;
        }
        self.users
            .read()
            .await
            .values()
            .find(|u| u.phone_number == number)
            .cloned()
    }

    /// 当前持有 admin 角色的唯一记录。唯一性由准入侧的降级步骤维护。
    pub async fn admin(&self) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.is_admin())
            .cloned()
    }

    pub async fn all(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }

    /// 合并编辑：补丁缺失的字段保留原值，返回合并后的记录。
    /// 只作用于已有记录；未知 id（从未准入或已删除）返回 `None`，
    /// 绝不凭空建档。
    pub async fn update(&self, id: &UserId, patch: UserPatch) -> Option<User> {
        let mut map = self.users.write().await;
        let user = map.get_mut(id)?;
        user.apply(patch);
        Some(user.clone())
    }

    /// 整条替换（水合补录、管理员编辑后回写）。
    pub async fn put(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn remove(&self, id: &UserId) -> Option<User> {
        self.users.write().await.remove(id)
    }

    /// 将除 `keep` 之外的所有 admin 记录降级为普通用户，
    /// 返回被降级的记录供持久层尽力同步。
    pub async fn demote_others(&self, keep: &UserId) -> Vec<User> {
        let mut map = self.users.write().await;
        let mut demoted = Vec::new();
        for user in map.values_mut() {
            if user.is_admin() && &user.id != keep {
                user.role = Role::User;
                demoted.push(user.clone());
            }
        }
        demoted
    }

    /// 名册快照：每次调用重新计算在线标记，不缓存。
    pub async fn snapshot(&self, presence: &PresenceRegistry) -> Vec<RosterEntry> {
        let online = presence.online_user_ids().await;
        self.users
            .read()
            .await
            .values()
            .map(|user| RosterEntry {
                is_online: online.contains(&user.id),
                user: user.clone(),
            })
            .collect()
    }
}
