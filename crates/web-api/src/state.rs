use std::path::PathBuf;
use std::sync::Arc;

use application::{
    AdminService, ConnectionRegistry, MessageRouter, PresenceRegistry, RosterCache, SessionGate,
    StatusBroadcaster,
};
use domain::{UploadStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SessionGate>,
    pub router: Arc<MessageRouter>,
    pub statuses: Arc<StatusBroadcaster>,
    pub admin: Arc<AdminService>,
    pub roster: Arc<RosterCache>,
    pub presence: Arc<PresenceRegistry>,
    pub outbound: Arc<ConnectionRegistry>,
    pub users: Arc<dyn UserStore>,
    pub uploads: Arc<dyn UploadStore>,
    /// 分块上传的落盘目录
    pub upload_dir: PathBuf,
}
