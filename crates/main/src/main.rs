//! 主应用程序入口
//!
//! 组装内存存储与应用层服务，启动 Axum 服务。

use std::sync::Arc;
use std::time::Duration;

use application::{
    AdminService, AdminServiceDependencies, ConnectionRegistry, MessageRouter,
    MessageRouterDependencies, PresenceRegistry, RosterCache, SessionGate,
    SessionGateDependencies, StatusBroadcaster, StatusBroadcasterDependencies, SystemClock,
    TempBlock,
};
use config::AppConfig;
use domain::{BanList, UserStore};
use infrastructure::MemoryStore;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;

    let store = MemoryStore::new();
    let roster = Arc::new(RosterCache::new());
    let presence = Arc::new(PresenceRegistry::new());
    let outbound = Arc::new(ConnectionRegistry::new());
    let temp_block = TempBlock::new(Duration::from_secs(config.retention.temp_block_secs));
    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);

    // 启动时尽力水合名册，失败只留日志
    match UserStore::all(&store).await {
        Ok(users) => {
            tracing::info!(count = users.len(), "roster hydrated from store");
            roster.hydrate(users).await;
        }
        Err(err) => {
            tracing::warn!(error = %err, "roster hydration failed, starting empty");
        }
    }

    let gate = Arc::new(SessionGate::new(SessionGateDependencies {
        roster: Arc::clone(&roster),
        presence: Arc::clone(&presence),
        users: Arc::new(store.clone()),
        tombstones: Arc::new(store.clone()),
        bans: BanList::new(config.bans.names.clone(), config.bans.numbers.clone()),
        admin_name: config.admin.reserved_name.clone(),
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
        admin_secret: config.admin.secret.clone(),
    }));

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
        upload_dir: config.upload.dir.clone().into(),
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;

    tracing::info!(address = %config.bind_address(), "chat server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
