//! 双向连接通道上的事件契约
//!
//! 所有事件为 JSON 文本帧，`type` 字段区分事件名。客户端对
//! `typing` 事件应自行套一个约 3 秒的防御性清除定时器，以防
//! `typing_stop` 丢失。

use serde::{Deserialize, Serialize};

use crate::message::{FileInfo, Message, MessageKind};
use crate::status::{StatusKind, StatusView};
use crate::user::{User, UserPatch};
use crate::value_objects::{MessageId, Recipient, StatusId, UserId};

/// 客户端发往服务端的事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// 接入请求，触发准入状态机
    Join {
        user_id: UserId,
        profile: UserPatch,
    },
    UpdateProfile {
        user_id: UserId,
        profile: UserPatch,
    },
    SendMessage {
        /// 缺失时由服务端分配
        #[serde(default)]
        id: Option<MessageId>,
        sender_id: UserId,
        receiver_id: Recipient,
        #[serde(default)]
        content: String,
        #[serde(default)]
        message_type: MessageKind,
        #[serde(default)]
        file: Option<FileInfo>,
        #[serde(default)]
        game_state: Option<serde_json::Value>,
    },
    MarkRead {
        reader_id: UserId,
        sender_id: UserId,
    },
    TypingStart {
        sender_id: UserId,
        receiver_id: UserId,
    },
    TypingStop {
        sender_id: UserId,
        receiver_id: UserId,
    },
    RequestHistory {
        user_id: UserId,
        contact_id: Recipient,
    },
    RequestGlobalHistory,
    SearchUser {
        phone_number: String,
    },
    PublishStatus {
        id: StatusId,
        user_id: UserId,
        #[serde(default)]
        content: String,
        #[serde(default, rename = "status_type")]
        kind: StatusKind,
    },
    RequestStatuses,
    DeleteStatus {
        status_id: StatusId,
        requester_id: UserId,
    },
    /// 独立的管理员握手：凭共享密钥将当前连接标记为管理通道，
    /// 不经过用户名册
    AdminLogin {
        secret: String,
    },
    AdminGetAllUsers {
        admin_id: UserId,
    },
    AdminCreateUser {
        admin_id: UserId,
        new_user: NewUserRequest,
    },
    AdminUpdateUser {
        admin_id: UserId,
        user_id: UserId,
        update: UserPatch,
    },
    AdminDeleteUser {
        admin_id: UserId,
        user_id: UserId,
    },
}

/// 管理员创建用户的请求体。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserRequest {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<crate::user::Role>,
}

/// 转发给接收方的消息，发送时刻用发送者当前资料增强。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: String,
    pub sender_avatar: String,
    pub sender_phone: String,
}

/// 名册快照条目：用户资料加实时在线标记。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(flatten)]
    pub user: User,
    pub is_online: bool,
}

/// 服务端发往客户端的事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// 准入成功，携带合并后的完整用户记录
    LoginSuccess { user: User },
    Error { message: String },
    /// 要求客户端清空本地身份缓存，随后连接会被强制关闭
    UserDeleted,
    ReceiveMessage(EnrichedMessage),
    MessageSent { id: MessageId },
    MessagesRead { contact_id: UserId },
    Typing { sender_id: UserId, active: bool },
    ChatHistory {
        contact_id: Recipient,
        messages: Vec<Message>,
    },
    UserFound { user: Option<User> },
    StatusUpdate { statuses: Vec<StatusView> },
    UserList { users: Vec<RosterEntry> },
    OnlineCount { count: usize },
    AdminUserList { users: Vec<RosterEntry> },
    /// `admin_login` 握手成功的确认
    AdminOk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_tags_follow_wire_names() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"join","user_id":"u1","profile":{"name":"Ann","number":"555"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::Join { user_id, profile } => {
                assert_eq!(user_id, UserId::new("u1"));
                assert_eq!(profile.username.as_deref(), Some("Ann"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn send_message_defaults_are_lenient() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"send_message","sender_id":"u1","receiver_id":"global","content":"hola"}"#,
        )
        .unwrap();
        match event {
            ClientEvent::SendMessage {
                id,
                receiver_id,
                message_type,
                ..
            } => {
                assert!(id.is_none());
                assert!(receiver_id.is_global());
                assert_eq!(message_type, MessageKind::Text);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_event_serializes_tagged() {
        let json = serde_json::to_value(ServerEvent::OnlineCount { count: 3 }).unwrap();
        assert_eq!(json["type"], "online_count");
        assert_eq!(json["count"], 3);
    }
}
