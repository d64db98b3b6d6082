//! 聊天服务核心领域模型
//!
//! 包含用户、消息、状态等核心实体，封禁规则，以及持久化存储的类型化边界。

pub mod ban;
pub mod errors;
pub mod message;
pub mod protocol;
pub mod status;
pub mod store;
pub mod upload;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use ban::*;
pub use errors::*;
pub use message::*;
pub use protocol::*;
pub use status::*;
pub use store::*;
pub use upload::*;
pub use user::*;
pub use value_objects::*;
