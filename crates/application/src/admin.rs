//! 管理操作
//!
//! 名册的增删改与强制下线。调用方的权限有两条路：名册中的
//! admin 角色，或凭共享密钥完成 `admin_login` 握手的管理通道。
//! 删除会写入永久墓碑并级联清理目标的消息与状态（尽力而为）。

use std::sync::Arc;

use domain::{
    ConnectionId, DomainError, MessageStore, NewUserRequest, Role, ServerEvent, StatusStore,
    TombstoneStore, User, UserId, UserPatch, UserStore, DEFAULT_USERNAME,
};

use crate::gate::TempBlock;
use crate::outbound::{broadcast_roster, ConnectionRegistry};
use crate::presence::PresenceRegistry;
use crate::roster::RosterCache;

pub struct AdminServiceDependencies {
    pub roster: Arc<RosterCache>,
    pub presence: Arc<PresenceRegistry>,
    pub outbound: Arc<ConnectionRegistry>,
    pub users: Arc<dyn UserStore>,
    pub messages: Arc<dyn MessageStore>,
    pub statuses: Arc<dyn StatusStore>,
    pub tombstones: Arc<dyn TombstoneStore>,
    pub temp_block: TempBlock,
    /// `admin_login` 握手用的共享密钥，空串视为禁用该通道
    pub admin_secret: String,
}

pub struct AdminService {
    deps: AdminServiceDependencies,
}

impl AdminService {
    pub fn new(deps: AdminServiceDependencies) -> Self {
        Self { deps }
    }

    /// 独立的管理员握手：密钥匹配则把连接并入管理通道并回推名册。
    pub async fn login(&self, origin: ConnectionId, secret: &str) -> Result<(), DomainError> {
        if self.deps.admin_secret.is_empty() || secret != self.deps.admin_secret {
            tracing::info!(connection_id = %origin, "admin login rejected");
            return Err(DomainError::permission_denied("admin_login"));
        }
        self.deps.outbound.mark_admin(origin).await;
        self.deps
            .outbound
            .send_to_connection(origin, ServerEvent::AdminOk)
            .await;
        self.push_user_list(origin).await;
        tracing::info!(connection_id = %origin, "admin channel established");
        Ok(())
    }

    /// 校验调用方权限：名册 admin 角色或已握手的管理通道。
    async fn authorize(
        &self,
        caller: &UserId,
        origin: ConnectionId,
        action: &str,
    ) -> Result<(), DomainError> {
        if self.deps.outbound.is_admin_channel(origin).await {
            return Ok(());
        }
        let is_roster_admin = self
            .deps
            .roster
            .get(caller)
            .await
            .is_some_and(|u| u.is_admin());
        if is_roster_admin {
            return Ok(());
        }
        tracing::info!(caller = %caller, action, "admin operation denied");
        Err(DomainError::permission_denied(action))
    }

    pub async fn list_users(
        &self,
        caller: UserId,
        origin: ConnectionId,
    ) -> Result<(), DomainError> {
        self.authorize(&caller, origin, "admin_get_all_users").await?;
        self.push_user_list(origin).await;
        Ok(())
    }

    pub async fn create_user(
        &self,
        caller: UserId,
        origin: ConnectionId,
        request: NewUserRequest,
    ) -> Result<(), DomainError> {
        self.authorize(&caller, origin, "admin_create_user").await?;

        let id = request.id.unwrap_or_else(UserId::generate);
        let mut user = User::new(id.clone());
        user.username = request
            .username
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        user.phone_number = request.phone_number.unwrap_or_default();
        user.role = request.role.unwrap_or(Role::User);

        self.deps.roster.put(user.clone()).await;
        self.persist(user);
        tracing::info!(user_id = %id, caller = %caller, "user created by admin");

        self.rebroadcast().await;
        Ok(())
    }

    pub async fn update_user(
        &self,
        caller: UserId,
        origin: ConnectionId,
        target: UserId,
        patch: UserPatch,
    ) -> Result<(), DomainError> {
        self.authorize(&caller, origin, "admin_update_user").await?;

        let mut user = self
            .deps
            .roster
            .get(&target)
            .await
            .unwrap_or_else(|| User::new(target.clone()));
        user.apply_admin(patch);
        self.deps.roster.put(user.clone()).await;
        self.persist(user);
        tracing::info!(user_id = %target, caller = %caller, "user updated by admin");

        self.rebroadcast().await;
        Ok(())
    }

    /// 删除用户：名册与在线登记同步移除，墓碑与短时封锁挡住重连，
    /// 目标的消息/状态级联清理（尽力而为），所有连接收到
    /// `user_deleted` 后被强制关闭。管理员不能删除自己。
    pub async fn delete_user(
        &self,
        caller: UserId,
        origin: ConnectionId,
        target: UserId,
    ) -> Result<(), DomainError> {
        self.authorize(&caller, origin, "admin_delete_user").await?;
        if caller == target {
            return Err(DomainError::permission_denied("delete_self"));
        }

        let removed = self.deps.roster.remove(&target).await;

        // 墓碑是永久拒绝重连的依据，失败要留痕
        if let Err(err) = self.deps.tombstones.insert(&target).await {
            tracing::error!(user_id = %target, error = %err, "tombstone write failed");
        }
        self.deps.temp_block.insert(target.clone()).await;

        // 级联清理：用户记录、同号码残留、消息、状态
        let users = Arc::clone(&self.deps.users);
        let messages = Arc::clone(&self.deps.messages);
        let statuses = Arc::clone(&self.deps.statuses);
        let id = target.clone();
        let number = removed.as_ref().map(|u| u.phone_number.clone());
        tokio::spawn(async move {
            if let Err(err) = users.delete(&id).await {
                tracing::warn!(error = %err, "user delete persist failed");
            }
            if let Some(number) = number.filter(|n| !n.is_empty()) {
                if let Err(err) = users.delete_by_number(&number).await {
                    tracing::warn!(error = %err, "number cleanup failed");
                }
            }
            if let Err(err) = messages.delete_for_user(&id).await {
                tracing::warn!(error = %err, "message cascade delete failed");
            }
            if let Err(err) = statuses.delete_for_user(&id).await {
                tracing::warn!(error = %err, "status cascade delete failed");
            }
        });

        // 通知并强制断开目标的所有连接
        let conns = self.deps.presence.connections_of(&target).await;
        for conn in conns {
            self.deps
                .outbound
                .send_to_connection(conn, ServerEvent::UserDeleted)
                .await;
            self.deps.outbound.close_connection(conn).await;
            self.deps.presence.remove(conn).await;
        }

        tracing::info!(user_id = %target, caller = %caller, "user deleted by admin");
        self.rebroadcast().await;
        Ok(())
    }

    async fn push_user_list(&self, origin: ConnectionId) {
        let users = self.deps.roster.snapshot(&self.deps.presence).await;
        self.deps
            .outbound
            .send_to_connection(origin, ServerEvent::AdminUserList { users })
            .await;
    }

    async fn rebroadcast(&self) {
        broadcast_roster(&self.deps.roster, &self.deps.presence, &self.deps.outbound).await;
    }

    fn persist(&self, user: User) {
        let users = Arc::clone(&self.deps.users);
        tokio::spawn(async move {
            if let Err(err) = users.upsert(user).await {
                tracing::warn!(error = %err, "admin user persist failed");
            }
        });
    }
}
