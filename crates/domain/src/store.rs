//! 持久化存储的类型化边界
//!
//! 后端是一个文档型存储（按 id 的扁平集合：users、messages、statuses、
//! deleted_ids、uploads），这里只定义核心依赖的接口。所有方法均为异步，
//! 不保证写入立即可读：内存视图才是实时行为的权威来源。

use async_trait::async_trait;

use crate::errors::StoreResult;
use crate::message::Message;
use crate::status::Status;
use crate::upload::Upload;
use crate::value_objects::{StatusId, Timestamp, UploadId, UserId};
use crate::user::User;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: &UserId) -> StoreResult<Option<User>>;
    async fn all(&self) -> StoreResult<Vec<User>>;
    async fn find_by_number(&self, number: &str) -> StoreResult<Option<User>>;
    async fn find_admin(&self) -> StoreResult<Option<User>>;
    /// 全量覆盖写入（合并语义在内存层完成）。
    async fn upsert(&self, user: User) -> StoreResult<()>;
    async fn delete(&self, id: &UserId) -> StoreResult<()>;
    /// 删除所有持有该号码的记录，级联清理时使用。
    async fn delete_by_number(&self, number: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save(&self, message: Message) -> StoreResult<()>;
    /// a/b 之间的私聊历史，时间戳升序。
    async fn conversation(&self, a: &UserId, b: &UserId) -> StoreResult<Vec<Message>>;
    /// 全局频道历史，时间戳升序。
    async fn global_history(&self) -> StoreResult<Vec<Message>>;
    /// 将 sender→reader 的所有消息置为已读。
    async fn mark_read(&self, reader: &UserId, sender: &UserId) -> StoreResult<()>;
    /// 删除该用户发送或接收的全部消息。
    async fn delete_for_user(&self, id: &UserId) -> StoreResult<()>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn save(&self, status: Status) -> StoreResult<()>;
    async fn get(&self, id: &StatusId) -> StoreResult<Option<Status>>;
    /// 晚于 cutoff 发布的状态，时间戳降序。过期过滤只发生在这里。
    async fn recent(&self, cutoff: Timestamp) -> StoreResult<Vec<Status>>;
    async fn delete(&self, id: &StatusId) -> StoreResult<()>;
    async fn delete_for_user(&self, id: &UserId) -> StoreResult<()>;
}

/// 永久删除墓碑：写入后该 id 永远无法重新接入，只增不减。
#[async_trait]
pub trait TombstoneStore: Send + Sync {
    async fn insert(&self, id: &UserId) -> StoreResult<()>;
    async fn contains(&self, id: &UserId) -> StoreResult<bool>;
}

#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn init(&self, upload: Upload) -> StoreResult<()>;
    /// 记录一个分块的字节数，返回更新后的进度。
    async fn record_chunk(&self, id: &UploadId, len: u64) -> StoreResult<Option<Upload>>;
    async fn get(&self, id: &UploadId) -> StoreResult<Option<Upload>>;
}
