//! 消息路由
//!
//! 私聊与全局广播的投递、已读回执、输入指示转发与历史查询。
//! 持久化全部发后不理：投递从不等待存储，存储失败只记日志。

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use domain::{
    ConnectionId, EnrichedMessage, Message, MessageId, MessageKind, MessageStore, Recipient,
    ServerEvent, UserId, DEFAULT_USERNAME,
};

use crate::clock::Clock;
use crate::outbound::ConnectionRegistry;
use crate::presence::PresenceRegistry;
use crate::roster::RosterCache;

/// 近期已转发消息 id 的有界集合，保证重试下至多一次投递。
const SEEN_CAPACITY: usize = 1024;

#[derive(Default)]
struct SeenIds {
    set: HashSet<MessageId>,
    order: VecDeque<MessageId>,
}

impl SeenIds {
    /// 返回 false 表示该 id 已经处理过。
    fn insert(&mut self, id: MessageId) -> bool {
        if !self.set.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > SEEN_CAPACITY {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub id: Option<MessageId>,
    pub sender_id: UserId,
    pub recipient: Recipient,
    pub content: String,
    pub kind: MessageKind,
    pub file: Option<domain::FileInfo>,
    pub game_state: Option<serde_json::Value>,
}

pub struct MessageRouterDependencies {
    pub roster: Arc<RosterCache>,
    pub presence: Arc<PresenceRegistry>,
    pub outbound: Arc<ConnectionRegistry>,
    pub messages: Arc<dyn MessageStore>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessageRouter {
    deps: MessageRouterDependencies,
    seen: Mutex<SeenIds>,
}

impl MessageRouter {
    pub fn new(deps: MessageRouterDependencies) -> Self {
        Self {
            deps,
            seen: Mutex::new(SeenIds::default()),
        }
    }

    /// 投递一条消息。发送方缺失时静默丢弃（仅日志），
    /// 其余任何失败都不会回传给发送方。
    pub async fn send(&self, origin: ConnectionId, request: SendMessageRequest) {
        if request.sender_id.as_str().is_empty() {
            tracing::warn!("send_message dropped: missing sender");
            return;
        }

        let id = request.id.unwrap_or_else(MessageId::generate);
        if !self.seen.lock().await.insert(id.clone()) {
            tracing::debug!(message_id = %id, "duplicate message id, skipping");
            return;
        }

        let message = Message {
            id: id.clone(),
            sender_id: request.sender_id.clone(),
            recipient: request.recipient.clone(),
            content: request.content,
            kind: request.kind,
            file: request.file,
            game_state: request.game_state,
            timestamp: self.deps.clock.now(),
            read: false,
        };

        // 发送时刻增强：取发送者当前资料，缺失则用占位名，绝不失败
        let enriched = self.enrich(message.clone()).await;

        // 发后不理的持久化，投递不等待
        let store = Arc::clone(&self.deps.messages);
        let persisted = message.clone();
        tokio::spawn(async move {
            if let Err(err) = store.save(persisted).await {
                tracing::warn!(error = %err, "message persist failed");
            }
        });

        let event = ServerEvent::ReceiveMessage(enriched);
        match &message.recipient {
            // 全局广播总是回声给发送方自己的连接（确定性选择）
            Recipient::Global => {
                self.deps.outbound.broadcast_all(event).await;
            }
            Recipient::Direct(receiver) => {
                let mut targets = self.deps.presence.connections_of(receiver).await;
                // 发送方的其他设备也要看到自己发出的消息
                for conn in self.deps.presence.connections_of(&message.sender_id).await {
                    if !targets.contains(&conn) {
                        targets.push(conn);
                    }
                }
                self.deps.outbound.send_to_connections(&targets, event).await;
            }
        }

        self.deps
            .outbound
            .send_to_connection(origin, ServerEvent::MessageSent { id })
            .await;
    }

    /// 将 sender→reader 的消息置为已读，并向发送方所有连接回执。
    pub async fn mark_read(&self, reader_id: UserId, sender_id: UserId) {
        if let Err(err) = self.deps.messages.mark_read(&reader_id, &sender_id).await {
            tracing::warn!(error = %err, "mark_read persist failed");
        }

        let targets = self.deps.presence.connections_of(&sender_id).await;
        self.deps
            .outbound
            .send_to_connections(
                &targets,
                ServerEvent::MessagesRead {
                    contact_id: reader_id,
                },
            )
            .await;
    }

    /// 输入指示纯转发，不持久化。接收端自行做防丢失的自动清除。
    pub async fn typing(&self, sender_id: UserId, receiver_id: UserId, active: bool) {
        let targets = self.deps.presence.connections_of(&receiver_id).await;
        self.deps
            .outbound
            .send_to_connections(&targets, ServerEvent::Typing { sender_id, active })
            .await;
    }

    /// 拉取历史并单播给请求连接。存储失败返回空列表，不报错。
    pub async fn history(&self, origin: ConnectionId, user_id: UserId, contact: Recipient) {
        let result = match &contact {
            Recipient::Global => self.deps.messages.global_history().await,
            Recipient::Direct(contact_id) => {
                self.deps.messages.conversation(&user_id, contact_id).await
            }
        };
        let messages = match result {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(error = %err, "history query failed, returning empty");
                Vec::new()
            }
        };
        self.deps
            .outbound
            .send_to_connection(
                origin,
                ServerEvent::ChatHistory {
                    contact_id: contact,
                    messages,
                },
            )
            .await;
    }

    async fn enrich(&self, message: Message) -> EnrichedMessage {
        match self.deps.roster.get(&message.sender_id).await {
            Some(sender) => EnrichedMessage {
                message,
                sender_name: sender.username,
                sender_avatar: sender.avatar,
                sender_phone: sender.phone_number,
            },
            None => EnrichedMessage {
                message,
                sender_name: DEFAULT_USERNAME.to_string(),
                sender_avatar: String::new(),
                sender_phone: String::new(),
            },
        }
    }
}
