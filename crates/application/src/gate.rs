//! 连接准入状态机
//!
//! 校验接入请求（封禁名单、删除墓碑、号码重复、管理员仲裁），
//! 决定角色并落地名册与在线登记。准入路径是唯一允许改变连接层
//! 结果的失败路径，其余存储失败一律降级为日志。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use domain::{
    BanList, DomainError, Role, TombstoneStore, User, UserId, UserPatch, UserStore,
};

use crate::presence::PresenceRegistry;
use crate::roster::RosterCache;

/// 准入结果。终态：要么入会并确定角色，要么带原因拒绝。
#[derive(Debug)]
pub enum Admission {
    Granted {
        /// 合并后的完整用户记录
        user: User,
    },
    Rejected {
        reason: DomainError,
        /// 要求客户端清空本地身份（封禁/删除场景）
        wipe_client: bool,
        /// 拒绝后强制断开连接
        disconnect: bool,
    },
}

impl Admission {
    fn rejected(reason: DomainError) -> Self {
        Admission::Rejected {
            reason,
            wipe_client: false,
            disconnect: false,
        }
    }
}

/// 删除后的短时内存封锁，吸收墓碑写入生效前的立即重连。
/// 条目在 TTL 后由定时任务自动移除。
#[derive(Clone)]
pub struct TempBlock {
    blocked: Arc<RwLock<HashSet<UserId>>>,
    ttl: Duration,
}

impl TempBlock {
    pub fn new(ttl: Duration) -> Self {
        Self {
            blocked: Arc::new(RwLock::new(HashSet::new())),
            ttl,
        }
    }

    pub async fn insert(&self, id: UserId) {
        self.blocked.write().await.insert(id.clone());
        let blocked = Arc::clone(&self.blocked);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            blocked.write().await.remove(&id);
        });
    }

    pub async fn contains(&self, id: &UserId) -> bool {
        self.blocked.read().await.contains(id)
    }
}

pub struct SessionGateDependencies {
    pub roster: Arc<RosterCache>,
    pub presence: Arc<PresenceRegistry>,
    pub users: Arc<dyn UserStore>,
    pub tombstones: Arc<dyn TombstoneStore>,
    pub bans: BanList,
    /// 保留的管理员哨兵名，资料名与之完全相等才参与角色仲裁
    pub admin_name: String,
    pub temp_block: TempBlock,
}

pub struct SessionGate {
    deps: SessionGateDependencies,
}

impl SessionGate {
    pub fn new(deps: SessionGateDependencies) -> Self {
        Self { deps }
    }

    pub fn temp_block(&self) -> &TempBlock {
        &self.deps.temp_block
    }

    /// 处理一次接入请求。内部的存储失败不会向外抛出：墓碑读取失败
    /// 按“未删除”继续（记录告警），用户读取失败降级为通用拒绝。
    pub async fn join(
        &self,
        connection_id: domain::ConnectionId,
        user_id: UserId,
        profile: UserPatch,
    ) -> Admission {
        // 1. 基本校验
        if user_id.as_str().is_empty() || !profile.has_name() {
            return Admission::rejected(DomainError::InvalidRequest);
        }
        let name = profile.username.clone().unwrap_or_default();
        let number = profile.normalized_number();

        // 2. 封禁名单
        if self.deps.bans.matches(&name, number.as_deref()) {
            tracing::info!(user_id = %user_id, name = %name, "join rejected: banned profile");
            return Admission::Rejected {
                reason: DomainError::Banned,
                wipe_client: false,
                disconnect: true,
            };
        }

        // 3. 删除墓碑：短时封锁与持久墓碑任一命中即拒绝
        let tombstoned = match self.deps.tombstones.contains(&user_id).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "tombstone check failed, continuing");
                false
            }
        };
        if tombstoned || self.deps.temp_block.contains(&user_id).await {
            tracing::info!(user_id = %user_id, "join rejected: deleted account");
            return Admission::Rejected {
                reason: DomainError::AccountDeleted,
                wipe_client: true,
                disconnect: true,
            };
        }

        // 4. 号码重复：同号码绑定在其他用户上则拒绝。
        // 已知竞态：两个携带同一新号码的并发接入可能都通过此检查，
        // 先落地者胜出。
        if let Some(number) = number.as_deref() {
            if let Some(owner) = self.deps.roster.get_by_number(number).await {
                if owner.id != user_id {
                    tracing::info!(user_id = %user_id, number = %number, "join rejected: number in use");
                    return Admission::rejected(DomainError::IdentifierInUse);
                }
            }
        }

        // 现有记录：名册优先，冷记录回退到持久层
        let existing = match self.deps.roster.get(&user_id).await {
            Some(user) => Some(user),
            None => match self.deps.users.get(&user_id).await {
                Ok(user) => user,
                Err(err) => {
                    tracing::error!(user_id = %user_id, error = %err, "user lookup failed during join");
                    return Admission::rejected(DomainError::join_failed("buscar existente"));
                }
            },
        };

        // 5. 角色仲裁：哨兵名申请 admin，已有其他 admin 则静默降级。
        // 对当前名册状态是全函数且确定的：先到的 admin 胜出。
        let role = self.arbitrate_role(&user_id, &name, existing.as_ref()).await;

        // 6. 合并落地：先名册后在线登记，持久化发后不理
        let mut user = existing.unwrap_or_else(|| User::new(user_id.clone()));
        user.apply(profile);
        user.role = role;
        self.deps.roster.put(user.clone()).await;
        self.deps.presence.add(user_id.clone(), connection_id).await;

        let users = Arc::clone(&self.deps.users);
        let persisted = user.clone();
        tokio::spawn(async move {
            if let Err(err) = users.upsert(persisted).await {
                tracing::warn!(error = %err, "user persist failed after join");
            }
        });

        // 7. 管理员入会的副作用：其余 admin 记录同步降级，
        // 持久层尽力跟进
        if role == Role::Admin {
            let demoted = self.deps.roster.demote_others(&user_id).await;
            for record in demoted {
                tracing::info!(demoted = %record.id, new_admin = %user_id, "demoting stale admin");
                let users = Arc::clone(&self.deps.users);
                tokio::spawn(async move {
                    if let Err(err) = users.upsert(record).await {
                        tracing::warn!(error = %err, "admin demotion persist failed");
                    }
                });
            }
        }

        tracing::info!(user_id = %user_id, username = %user.username, role = ?user.role, "join accepted");
        Admission::Granted { user }
    }

    async fn arbitrate_role(&self, user_id: &UserId, name: &str, existing: Option<&User>) -> Role {
        let current_role = existing.map(|u| u.role).unwrap_or(Role::User);
        if name != self.deps.admin_name {
            return current_role;
        }
        match self.deps.roster.admin().await {
            None => Role::Admin,
            Some(holder) if holder.id == *user_id => Role::Admin,
            Some(holder) => {
                tracing::info!(holder = %holder.id, claimant = %user_id, "admin slot taken, granting user role");
                Role::User
            }
        }
    }
}
