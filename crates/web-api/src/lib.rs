//! Web API 层。
//!
//! 提供 Axum 路由：`/ws` 上的事件通道交给应用层的用例服务，
//! 分块上传/下载走 HTTP 边界，字节流不经过核心。

mod error;
mod routes;
mod state;
mod ws;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
