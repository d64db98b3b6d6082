//! 内存文档存储
//!
//! 所有集合都是 RwLock 保护的 HashMap，语义对齐外部文档存储的
//! get/set/delete/按字段查询。查询在读取后于内存中过滤排序。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use domain::{
    Message, MessageStore, Recipient, Status, StatusId, StatusStore, StoreResult, TombstoneStore,
    Timestamp, Upload, UploadId, UploadStore, User, UserId, UserStore,
};

#[derive(Default)]
struct Collections {
    users: HashMap<UserId, User>,
    messages: HashMap<domain::MessageId, Message>,
    statuses: HashMap<StatusId, Status>,
    deleted_ids: HashSet<UserId>,
    uploads: HashMap<UploadId, Upload>,
}

/// 进程内文档存储。克隆共享同一份数据。
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn all(&self) -> StoreResult<Vec<User>> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }

    async fn find_by_number(&self, number: &str) -> StoreResult<Option<User>> {
        if number.is_empty() {
            return Ok(None);
        }
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.phone_number == number)
            .cloned())
    }

    async fn find_admin(&self) -> StoreResult<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.is_admin())
            .cloned())
    }

    async fn upsert(&self, user: User) -> StoreResult<()> {
        self.inner.write().await.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn delete(&self, id: &UserId) -> StoreResult<()> {
        self.inner.write().await.users.remove(id);
        Ok(())
    }

    async fn delete_by_number(&self, number: &str) -> StoreResult<()> {
        if number.is_empty() {
            return Ok(());
        }
        self.inner
            .write()
            .await
            .users
            .retain(|_, u| u.phone_number != number);
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn save(&self, message: Message) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .messages
            .insert(message.id.clone(), message);
        Ok(())
    }

    async fn conversation(&self, a: &UserId, b: &UserId) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .inner
            .read()
            .await
            .messages
            .values()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn global_history(&self) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .inner
            .read()
            .await
            .messages
            .values()
            .filter(|m| m.recipient == Recipient::Global)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn mark_read(&self, reader: &UserId, sender: &UserId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        for message in inner.messages.values_mut() {
            if &message.sender_id == sender
                && message.recipient == Recipient::Direct(reader.clone())
            {
                message.read = true;
            }
        }
        Ok(())
    }

    async fn delete_for_user(&self, id: &UserId) -> StoreResult<()> {
        self.inner.write().await.messages.retain(|_, m| {
            &m.sender_id != id && m.recipient != Recipient::Direct(id.clone())
        });
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn save(&self, status: Status) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .statuses
            .insert(status.id.clone(), status);
        Ok(())
    }

    async fn get(&self, id: &StatusId) -> StoreResult<Option<Status>> {
        Ok(self.inner.read().await.statuses.get(id).cloned())
    }

    async fn recent(&self, cutoff: Timestamp) -> StoreResult<Vec<Status>> {
        let mut statuses: Vec<Status> = self
            .inner
            .read()
            .await
            .statuses
            .values()
            .filter(|s| s.timestamp > cutoff)
            .cloned()
            .collect();
        statuses.sort_by_key(|s| std::cmp::Reverse(s.timestamp));
        Ok(statuses)
    }

    async fn delete(&self, id: &StatusId) -> StoreResult<()> {
        self.inner.write().await.statuses.remove(id);
        Ok(())
    }

    async fn delete_for_user(&self, id: &UserId) -> StoreResult<()> {
        self.inner.write().await.statuses.retain(|_, s| &s.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl TombstoneStore for MemoryStore {
    async fn insert(&self, id: &UserId) -> StoreResult<()> {
        self.inner.write().await.deleted_ids.insert(id.clone());
        Ok(())
    }

    async fn contains(&self, id: &UserId) -> StoreResult<bool> {
        Ok(self.inner.read().await.deleted_ids.contains(id))
    }
}

#[async_trait]
impl UploadStore for MemoryStore {
    async fn init(&self, upload: Upload) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .uploads
            .insert(upload.id.clone(), upload);
        Ok(())
    }

    async fn record_chunk(&self, id: &UploadId, len: u64) -> StoreResult<Option<Upload>> {
        let mut inner = self.inner.write().await;
        Ok(inner.uploads.get_mut(id).map(|upload| {
            upload.record_chunk(len);
            upload.clone()
        }))
    }

    async fn get(&self, id: &UploadId) -> StoreResult<Option<Upload>> {
        Ok(self.inner.read().await.uploads.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::{MessageId, MessageKind, StatusKind};

    fn message(id: &str, from: &str, to: Recipient, ts: Timestamp) -> Message {
        Message {
            id: MessageId::new(id),
            sender_id: UserId::new(from),
            recipient: to,
            content: "x".into(),
            kind: MessageKind::Text,
            file: None,
            game_state: None,
            timestamp: ts,
            read: false,
        }
    }

    #[tokio::test]
    async fn conversation_is_ordered_and_bidirectional() {
        let store = MemoryStore::new();
        let now = chrono::Utc::now();
        let u2 = Recipient::Direct(UserId::new("u2"));
        let u1 = Recipient::Direct(UserId::new("u1"));
        MessageStore::save(&store, message("m2", "u2", u1.clone(), now + Duration::seconds(1)))
            .await
            .unwrap();
        MessageStore::save(&store, message("m1", "u1", u2.clone(), now)).await.unwrap();
        MessageStore::save(&store, message("m3", "u1", Recipient::Global, now))
            .await
            .unwrap();

        let history = store
            .conversation(&UserId::new("u1"), &UserId::new("u2"))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, MessageId::new("m1"));
        assert_eq!(history[1].id, MessageId::new("m2"));
    }

    #[tokio::test]
    async fn mark_read_flips_only_matching_direction() {
        let store = MemoryStore::new();
        let now = chrono::Utc::now();
        MessageStore::save(&store, message("m1", "u1", Recipient::Direct(UserId::new("u2")), now))
            .await
            .unwrap();
        MessageStore::save(&store, message("m2", "u2", Recipient::Direct(UserId::new("u1")), now))
            .await
            .unwrap();

        store
            .mark_read(&UserId::new("u2"), &UserId::new("u1"))
            .await
            .unwrap();

        let history = store
            .conversation(&UserId::new("u1"), &UserId::new("u2"))
            .await
            .unwrap();
        let m1 = history.iter().find(|m| m.id == MessageId::new("m1")).unwrap();
        let m2 = history.iter().find(|m| m.id == MessageId::new("m2")).unwrap();
        assert!(m1.read);
        assert!(!m2.read);
    }

    #[tokio::test]
    async fn recent_filters_by_cutoff() {
        let store = MemoryStore::new();
        let now = chrono::Utc::now();
        StatusStore::save(&store, Status {
                id: StatusId::new("old"),
                user_id: UserId::new("u1"),
                content: "x".into(),
                kind: StatusKind::Text,
                timestamp: now - Duration::hours(30),
            })
            .await
            .unwrap();
        StatusStore::save(&store, Status {
                id: StatusId::new("fresh"),
                user_id: UserId::new("u1"),
                content: "y".into(),
                kind: StatusKind::Text,
                timestamp: now - Duration::hours(1),
            })
            .await
            .unwrap();

        let recent = store.recent(now - Duration::hours(24)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, StatusId::new("fresh"));
    }

    #[tokio::test]
    async fn cascade_delete_clears_user_artifacts() {
        let store = MemoryStore::new();
        let now = chrono::Utc::now();
        MessageStore::save(&store, message("m1", "u1", Recipient::Direct(UserId::new("u2")), now))
            .await
            .unwrap();
        MessageStore::save(&store, message("m2", "u3", Recipient::Direct(UserId::new("u1")), now))
            .await
            .unwrap();
        MessageStore::delete_for_user(&store, &UserId::new("u1"))
            .await
            .unwrap();

        let history = store
            .conversation(&UserId::new("u1"), &UserId::new("u2"))
            .await
            .unwrap();
        assert!(history.is_empty());
    }
}
