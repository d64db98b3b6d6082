//! 集成测试脚手架：内存存储 + 随机端口上的完整服务。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use application::{
    AdminService, AdminServiceDependencies, ConnectionRegistry, MessageRouter,
    MessageRouterDependencies, PresenceRegistry, RosterCache, SessionGate,
    SessionGateDependencies, StatusBroadcaster, StatusBroadcasterDependencies, SystemClock,
    TempBlock,
};
use domain::BanList;
use futures::{SinkExt, StreamExt};
use infrastructure::MemoryStore;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn spawn_app() -> SocketAddr {
    spawn_app_with_secret("s3cret").await
}

pub async fn spawn_app_with_secret(admin_secret: &str) -> SocketAddr {
    let store = MemoryStore::new();
    let roster = Arc::new(RosterCache::new());
    let presence = Arc::new(PresenceRegistry::new());
    let outbound = Arc::new(ConnectionRegistry::new());
    let temp_block = TempBlock::new(Duration::from_millis(200));
    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);

    let gate = Arc::new(SessionGate::new(SessionGateDependencies {
        roster: Arc::clone(&roster),
        presence: Arc::clone(&presence),
        users: Arc::new(store.clone()),
        tombstones: Arc::new(store.clone()),
        bans: BanList::new(vec!["troll".to_string()], vec!["666".to_string()]),
        admin_name: "Admin".to_string(),
        temp_block: temp_block.clone(),
    }));

    let message_router = Arc::new(MessageRouter::new(MessageRouterDependencies {
        roster: Arc::clone(&roster),
        presence: Arc::clone(&presence),
        outbound: Arc::clone(&outbound),
        messages: Arc::new(store.clone()),
        clock: Arc::clone(&clock),
    }));

    let statuses = Arc::new(StatusBroadcaster::new(StatusBroadcasterDependencies {
        roster: Arc::clone(&roster),
        outbound: Arc::clone(&outbound),
        statuses: Arc::new(store.clone()),
        clock: Arc::clone(&clock),
    }));

    let admin = Arc::new(AdminService::new(AdminServiceDependencies {
        roster: Arc::clone(&roster),
        presence: Arc::clone(&presence),
        outbound: Arc::clone(&outbound),
        users: Arc::new(store.clone()),
        messages: Arc::new(store.clone()),
        statuses: Arc::new(store.clone()),
        tombstones: Arc::new(store.clone()),
        temp_block,
        admin_secret: admin_secret.to_string(),
    }));

    let upload_dir =
        std::env::temp_dir().join(format!("konek-test-{}", domain::UploadId::generate()));

    let state = AppState {
        gate,
        router: message_router,
        statuses,
        admin,
        roster,
        presence,
        outbound,
        users: Arc::new(store.clone()),
        uploads: Arc::new(store),
        upload_dir,
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

pub async fn connect_ws(addr: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    ws
}

pub async fn send_event(ws: &mut WsClient, event: serde_json::Value) {
    ws.send(TungsteniteMessage::Text(event.to_string().into()))
        .await
        .expect("ws send");
}

/// 读取事件直到命中指定的 `type`，中途的名册/计数等广播直接跳过。
pub async fn recv_event_of(ws: &mut WsClient, event_type: &str) -> serde_json::Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {event_type}"))
            .unwrap_or_else(|| panic!("connection closed waiting for {event_type}"))
            .expect("ws frame");
        if let TungsteniteMessage::Text(payload) = message {
            let event: serde_json::Value = serde_json::from_str(&payload).expect("event json");
            if event["type"] == event_type {
                return event;
            }
        }
    }
}

/// 以给定身份接入并消费 `login_success`。
pub async fn join(ws: &mut WsClient, user_id: &str, name: &str) -> serde_json::Value {
    send_event(
        ws,
        serde_json::json!({
            "type": "join",
            "user_id": user_id,
            "profile": { "name": name }
        }),
    )
    .await;
    recv_event_of(ws, "login_success").await
}
