use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// 用户角色。系统不变式：任意时刻最多一个用户持有 `Admin`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// 首次接入时的占位显示名。
pub const DEFAULT_USERNAME: &str = "Usuario";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// 头像引用，允许为空。
    pub avatar: String,
    /// 简介文字，允许为空。
    pub status_text: String,
    /// 标识号码。非空时在所有未删除用户间必须唯一，空串表示未分配。
    pub phone_number: String,
    pub role: Role,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            username: DEFAULT_USERNAME.to_string(),
            avatar: String::new(),
            status_text: String::new(),
            phone_number: String::new(),
            role: Role::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 合并一份补丁：补丁中缺失或为空的字段保留原值。
    ///
    /// 号码字段沿用原值优先（COALESCE 语义）：已有非空号码不会被普通
    /// 资料更新覆盖。角色字段从不在此处变更：角色只由准入仲裁
    /// 或管理员编辑（[`User::apply_admin`]）决定。
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(username) = patch.username.filter(|s| !s.is_empty()) {
            self.username = username;
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = avatar;
        }
        if let Some(status_text) = patch.status_text {
            self.status_text = status_text;
        }
        if let Some(number) = patch.phone_number.filter(|s| !s.is_empty()) {
            if self.phone_number.is_empty() {
                self.phone_number = number;
            }
        }
    }

    /// 管理员编辑：与 [`User::apply`] 不同，号码允许被覆盖。
    pub fn apply_admin(&mut self, patch: UserPatch) {
        if let Some(username) = patch.username.filter(|s| !s.is_empty()) {
            self.username = username;
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = avatar;
        }
        if let Some(status_text) = patch.status_text {
            self.status_text = status_text;
        }
        if let Some(number) = patch.phone_number {
            self.phone_number = number;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }
}

/// 用户资料补丁，`None` 表示不修改对应字段。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, alias = "name")]
    pub username: Option<String>,
    #[serde(default, alias = "photo")]
    pub avatar: Option<String>,
    #[serde(default, alias = "description")]
    pub status_text: Option<String>,
    #[serde(default, alias = "number")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl UserPatch {
    /// 入会请求至少要携带一个显示名。
    pub fn has_name(&self) -> bool {
        self.username.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// 去除号码两端空白，空串归一化为 `None`。
    pub fn normalized_number(&self) -> Option<String> {
        self.phone_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
