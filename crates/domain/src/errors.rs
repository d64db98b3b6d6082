//! 领域错误定义
//!
//! 区分两类失败：接入/权限类的领域错误（会改变连接层结果），
//! 以及持久化后端的存储错误（在尽力而为路径上只记录日志）。

use thiserror::Error;

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 客户端载荷缺失或畸形，拒绝且不产生任何状态变更
    #[error("datos de conexión inválidos")]
    InvalidRequest,

    /// 名称或号码命中封禁名单
    #[error("esta cuenta ha sido prohibida")]
    Banned,

    /// 用户 id 已被永久删除，禁止重新接入
    #[error("esta cuenta ha sido desactivada por el administrador")]
    AccountDeleted,

    /// 号码已被其他未删除用户占用
    #[error("este número ya está en uso por otro usuario")]
    IdentifierInUse,

    /// 非管理员尝试执行管理操作
    #[error("permiso denegado: {action}")]
    PermissionDenied { action: String },

    /// 接入流程中的意外失败，降级为通用拒绝
    #[error("error al unirse ({step})")]
    JoinFailed { step: String },

    /// 资源不存在
    #[error("{resource} no encontrado: {id}")]
    NotFound { resource: String, id: String },
}

impl DomainError {
    pub fn permission_denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }

    pub fn join_failed(step: impl Into<String>) -> Self {
        Self::JoinFailed { step: step.into() }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }
}

/// 持久化后端错误。后端只保证最终一致，调用方决定失败是否致命。
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储结果类型
pub type StoreResult<T> = Result<T, StoreError>;
