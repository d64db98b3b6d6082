use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageId, Recipient, Timestamp, UserId};

/// 消息载荷类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    File,
    Image,
    Audio,
    Game,
}

/// 文件类消息附带的元数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// 指向上传存储的不透明路径。
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// 客户端生成的幂等键：同一 id 重复发送不产生重复投递。
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(rename = "receiver_id")]
    pub recipient: Recipient,
    pub content: String,
    #[serde(rename = "message_type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileInfo>,
    /// 游戏类消息的状态载荷，可原地更新。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_state: Option<serde_json::Value>,
    /// 服务端在持久化时分配。
    pub timestamp: Timestamp,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// 判断消息是否属于 a/b 两个用户之间的私聊。
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        match &self.recipient {
            Recipient::Global => false,
            Recipient::Direct(to) => {
                (&self.sender_id == a && to == b) || (&self.sender_id == b && to == a)
            }
        }
    }
}
