//! 应用层实现。
//!
//! 围绕内存态的在线/名册视图提供用例服务：连接准入、消息路由、
//! 状态广播、管理操作，以及向各连接扇出的出站通道。持久化存储
//! 是滞后的镜像，实时行为以这里的内存结构为准。

pub mod admin;
pub mod clock;
pub mod error;
pub mod gate;
pub mod outbound;
pub mod presence;
pub mod roster;
pub mod router;
pub mod statuses;

#[cfg(test)]
mod gate_tests;

pub use admin::{AdminService, AdminServiceDependencies};
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use gate::{Admission, SessionGate, SessionGateDependencies, TempBlock};
pub use outbound::{broadcast_roster, ConnectionRegistry, OutboundFrame};
pub use presence::PresenceRegistry;
pub use roster::RosterCache;
pub use router::{MessageRouter, MessageRouterDependencies, SendMessageRequest};
pub use statuses::{StatusBroadcaster, StatusBroadcasterDependencies};
