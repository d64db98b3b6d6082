//! 事件通道
//!
//! 每个连接升级后拆分为发送/接收两个任务：发送任务消费出站
//! 命令帧（事件或强制关闭），接收任务解析客户端事件并分发到
//! 应用层服务。畸形事件与处理失败统一降级为 `error` 事件，
//! 连接任务本身不会因此终止。

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use application::{broadcast_roster, Admission, OutboundFrame, SendMessageRequest};
use domain::{ClientEvent, ConnectionId, DomainError, Recipient, ServerEvent, UserId};

use crate::state::AppState;

pub async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::generate();
    tracing::info!(connection_id = %connection_id, "connection established");

    let (mut sender, mut incoming) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    state.outbound.register(connection_id, tx).await;

    // 发送任务：统一处理所有对 socket 的写操作
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                OutboundFrame::Event(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize outbound event");
                            continue;
                        }
                    };
                    if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close => {
                    let _ = sender.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    // 接收任务：解析并分发客户端事件
    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                WsMessage::Text(text) => {
                    dispatch(&recv_state, connection_id, text.as_str()).await;
                }
                WsMessage::Close(_) => break,
                // ping/pong 由 axum 自动应答
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    // 断开清理：出站通道、在线登记，然后向其余连接重播名册
    state.outbound.unregister(connection_id).await;
    if let Some(user_id) = state.presence.remove(connection_id).await {
        tracing::info!(connection_id = %connection_id, user_id = %user_id, "connection closed");
    }
    broadcast_roster(&state.roster, &state.presence, &state.outbound).await;
}

async fn dispatch(state: &AppState, connection_id: ConnectionId, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(connection_id = %connection_id, error = %err, "malformed client event");
            send_error(state, connection_id, "formato de evento no válido").await;
            return;
        }
    };
    handle_event(state, connection_id, event).await;
}

async fn handle_event(state: &AppState, connection_id: ConnectionId, event: ClientEvent) {
    match event {
        ClientEvent::Join { user_id, profile } => {
            match state.gate.join(connection_id, user_id, profile).await {
                Admission::Granted { user } => {
                    if user.is_admin() {
                        state.outbound.mark_admin(connection_id).await;
                    }
                    state
                        .outbound
                        .send_to_connection(connection_id, ServerEvent::LoginSuccess { user })
                        .await;
                    broadcast_roster(&state.roster, &state.presence, &state.outbound).await;
                }
                Admission::Rejected {
                    reason,
                    wipe_client,
                    disconnect,
                } => {
                    if wipe_client {
                        state
                            .outbound
                            .send_to_connection(connection_id, ServerEvent::UserDeleted)
                            .await;
                    }
                    send_error(state, connection_id, reason.to_string()).await;
                    if disconnect {
                        state.outbound.close_connection(connection_id).await;
                    }
                }
            }
        }
        ClientEvent::UpdateProfile { user_id, profile } => {
            // 只编辑已准入的记录：未知或已删除的 id 不得借此建档
            let Some(user) = state.roster.update(&user_id, profile).await else {
                tracing::debug!(user_id = %user_id, "update_profile ignored: unknown user");
                return;
            };
            let users = Arc::clone(&state.users);
            tokio::spawn(async move {
                if let Err(err) = users.upsert(user).await {
                    tracing::warn!(error = %err, "profile persist failed");
                }
            });
            broadcast_roster(&state.roster, &state.presence, &state.outbound).await;
        }
        ClientEvent::SendMessage {
            id,
            sender_id,
            receiver_id,
            content,
            message_type,
            file,
            game_state,
        } => {
            state
                .router
                .send(
                    connection_id,
                    SendMessageRequest {
                        id,
                        sender_id,
                        recipient: receiver_id,
                        content,
                        kind: message_type,
                        file,
                        game_state,
                    },
                )
                .await;
        }
        ClientEvent::MarkRead {
            reader_id,
            sender_id,
        } => {
            state.router.mark_read(reader_id, sender_id).await;
        }
        ClientEvent::TypingStart {
            sender_id,
            receiver_id,
        } => {
            state.router.typing(sender_id, receiver_id, true).await;
        }
        ClientEvent::TypingStop {
            sender_id,
            receiver_id,
        } => {
            state.router.typing(sender_id, receiver_id, false).await;
        }
        ClientEvent::RequestHistory {
            user_id,
            contact_id,
        } => {
            state.router.history(connection_id, user_id, contact_id).await;
        }
        ClientEvent::RequestGlobalHistory => {
            state
                .router
                .history(connection_id, UserId::new(""), Recipient::Global)
                .await;
        }
        ClientEvent::SearchUser { phone_number } => {
            let user = state.roster.get_by_number(&phone_number).await;
            state
                .outbound
                .send_to_connection(connection_id, ServerEvent::UserFound { user })
                .await;
        }
        ClientEvent::PublishStatus {
            id,
            user_id,
            content,
            kind,
        } => {
            state.statuses.publish(id, user_id, content, kind).await;
        }
        ClientEvent::RequestStatuses => {
            state.statuses.request_all(connection_id).await;
        }
        ClientEvent::DeleteStatus {
            status_id,
            requester_id,
        } => {
            let admin_channel = state.outbound.is_admin_channel(connection_id).await;
            report(
                state,
                connection_id,
                state
                    .statuses
                    .delete(status_id, requester_id, admin_channel)
                    .await,
            )
            .await;
        }
        ClientEvent::AdminLogin { secret } => {
            report(
                state,
                connection_id,
                state.admin.login(connection_id, &secret).await,
            )
            .await;
        }
        ClientEvent::AdminGetAllUsers { admin_id } => {
            report(
                state,
                connection_id,
                state.admin.list_users(admin_id, connection_id).await,
            )
            .await;
        }
        ClientEvent::AdminCreateUser { admin_id, new_user } => {
            report(
                state,
                connection_id,
                state
                    .admin
                    .create_user(admin_id, connection_id, new_user)
                    .await,
            )
            .await;
        }
        ClientEvent::AdminUpdateUser {
            admin_id,
            user_id,
            update,
        } => {
            report(
                state,
                connection_id,
                state
                    .admin
                    .update_user(admin_id, connection_id, user_id, update)
                    .await,
            )
            .await;
        }
        ClientEvent::AdminDeleteUser { admin_id, user_id } => {
            report(
                state,
                connection_id,
                state
                    .admin
                    .delete_user(admin_id, connection_id, user_id)
                    .await,
            )
            .await;
        }
    }
}

/// 将领域错误降级为发往当前连接的 `error` 事件。
async fn report(state: &AppState, connection_id: ConnectionId, result: Result<(), DomainError>) {
    if let Err(err) = result {
        send_error(state, connection_id, err.to_string()).await;
    }
}

async fn send_error(state: &AppState, connection_id: ConnectionId, message: impl Into<String>) {
    state
        .outbound
        .send_to_connection(
            connection_id,
            ServerEvent::Error {
                message: message.into(),
            },
        )
        .await;
}
