//! 连接准入单元测试
//!
//! 覆盖准入状态机的全部拒绝路径、角色仲裁的确定性，以及
//! 删除封锁的 TTL 行为。

use std::sync::Arc;
use std::time::Duration;

use domain::{BanList, ConnectionId, DomainError, Role, UserId, UserPatch};
use infrastructure::MemoryStore;

use crate::gate::{Admission, SessionGate, SessionGateDependencies, TempBlock};
use crate::presence::PresenceRegistry;
use crate::roster::RosterCache;

struct Harness {
    gate: SessionGate,
    roster: Arc<RosterCache>,
    presence: Arc<PresenceRegistry>,
    store: MemoryStore,
}

fn harness() -> Harness {
    harness_with_ttl(Duration::from_secs(60))
}

fn harness_with_ttl(ttl: Duration) -> Harness {
    let roster = Arc::new(RosterCache::new());
    let presence = Arc::new(PresenceRegistry::new());
    let store = MemoryStore::new();
    let gate = SessionGate::new(SessionGateDependencies {
        roster: Arc::clone(&roster),
        presence: Arc::clone(&presence),
        users: Arc::new(store.clone()),
        tombstones: Arc::new(store.clone()),
        bans: BanList::new(
            vec!["troll".to_string()],
            vec!["312".to_string()],
        ),
        admin_name: "Admin".to_string(),
        temp_block: TempBlock::new(ttl),
    });
    Harness {
        gate,
        roster,
        presence,
        store,
    }
}

fn profile(name: &str) -> UserPatch {
    UserPatch {
        username: Some(name.to_string()),
        ..UserPatch::default()
    }
}

fn profile_with_number(name: &str, number: &str) -> UserPatch {
    UserPatch {
        username: Some(name.to_string()),
        phone_number: Some(number.to_string()),
        ..UserPatch::default()
    }
}

fn assert_granted(admission: &Admission) -> &domain::User {
    match admission {
        Admission::Granted { user } => user,
        other => panic!("expected granted, got {other:?}"),
    }
}

#[tokio::test]
async fn join_accepts_and_registers_presence() {
    let h = harness();
    let conn = ConnectionId::generate();
    let admission = h
        .gate
        .join(conn, UserId::new("u1"), profile_with_number("Ann", "555"))
        .await;

    let user = assert_granted(&admission);
    assert_eq!(user.username, "Ann");
    assert_eq!(user.phone_number, "555");
    assert_eq!(user.role, Role::User);
    assert!(h.presence.is_online(&UserId::new("u1")).await);
    assert!(h.roster.get(&UserId::new("u1")).await.is_some());
}

#[tokio::test]
async fn join_rejects_missing_name() {
    let h = harness();
    let admission = h
        .gate
        .join(ConnectionId::generate(), UserId::new("u1"), UserPatch::default())
        .await;
    match admission {
        Admission::Rejected {
            reason: DomainError::InvalidRequest,
            disconnect,
            ..
        } => assert!(!disconnect),
        other => panic!("expected invalid request, got {other:?}"),
    }
    assert!(!h.presence.is_online(&UserId::new("u1")).await);
}

#[tokio::test]
async fn join_rejects_banned_name_and_number() {
    let h = harness();
    match h
        .gate
        .join(ConnectionId::generate(), UserId::new("u1"), profile("troll"))
        .await
    {
        Admission::Rejected {
            reason: DomainError::Banned,
            disconnect,
            ..
        } => assert!(disconnect),
        other => panic!("expected ban, got {other:?}"),
    }

    match h
        .gate
        .join(
            ConnectionId::generate(),
            UserId::new("u2"),
            profile_with_number("Ann", "312"),
        )
        .await
    {
        Admission::Rejected {
            reason: DomainError::Banned,
            ..
        } => {}
        other => panic!("expected ban, got {other:?}"),
    }
}

#[tokio::test]
async fn tombstoned_id_never_readmitted() {
    let h = harness();
    let doomed = UserId::new("u1");
    domain::TombstoneStore::insert(&h.store, &doomed).await.unwrap();

    // 改名换资料也无济于事
    for name in ["Ann", "Bob", "Admin"] {
        match h
            .gate
            .join(ConnectionId::generate(), doomed.clone(), profile(name))
            .await
        {
            Admission::Rejected {
                reason: DomainError::AccountDeleted,
                wipe_client,
                disconnect,
            } => {
                assert!(wipe_client);
                assert!(disconnect);
            }
            other => panic!("expected account deleted, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn temp_block_expires_after_ttl() {
    let h = harness_with_ttl(Duration::from_millis(50));
    let id = UserId::new("u1");
    h.gate.temp_block().insert(id.clone()).await;

    match h
        .gate
        .join(ConnectionId::generate(), id.clone(), profile("Ann"))
        .await
    {
        Admission::Rejected {
            reason: DomainError::AccountDeleted,
            ..
        } => {}
        other => panic!("expected temp block rejection, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(80)).await;
    let admission = h
        .gate
        .join(ConnectionId::generate(), id, profile("Ann"))
        .await;
    assert_granted(&admission);
}

#[tokio::test]
async fn duplicate_number_rejected_for_other_user() {
    let h = harness();
    assert_granted(
        &h.gate
            .join(
                ConnectionId::generate(),
                UserId::new("u1"),
                profile_with_number("Ann", "555"),
            )
            .await,
    );

    match h
        .gate
        .join(
            ConnectionId::generate(),
            UserId::new("u2"),
            profile_with_number("Bob", "555"),
        )
        .await
    {
        Admission::Rejected {
            reason: DomainError::IdentifierInUse,
            ..
        } => {}
        other => panic!("expected identifier in use, got {other:?}"),
    }

    // 同一用户携带自己的号码重连没问题
    assert_granted(
        &h.gate
            .join(
                ConnectionId::generate(),
                UserId::new("u1"),
                profile_with_number("Ann", "555"),
            )
            .await,
    );
}

#[tokio::test]
async fn admin_arbitration_is_first_wins() {
    let h = harness();

    let a = assert_granted(
        &h.gate
            .join(
                ConnectionId::generate(),
                UserId::new("u1"),
                profile_with_number("Ann", "555"),
            )
            .await,
    )
    .clone();
    assert_eq!(a.role, Role::User);

    let b = assert_granted(
        &h.gate
            .join(ConnectionId::generate(), UserId::new("u2"), profile("Admin"))
            .await,
    )
    .clone();
    assert_eq!(b.role, Role::Admin);

    // 第三方再用哨兵名接入：静默降级为普通用户，不报错
    let c = assert_granted(
        &h.gate
            .join(ConnectionId::generate(), UserId::new("u3"), profile("Admin"))
            .await,
    )
    .clone();
    assert_eq!(c.role, Role::User);

    // B 仍然是唯一的 admin
    let admin = h.roster.admin().await.unwrap();
    assert_eq!(admin.id, UserId::new("u2"));
}

#[tokio::test]
async fn existing_admin_keeps_role_on_rejoin() {
    let h = harness();
    assert_granted(
        &h.gate
            .join(ConnectionId::generate(), UserId::new("u2"), profile("Admin"))
            .await,
    );

    let again = h
        .gate
        .join(ConnectionId::generate(), UserId::new("u2"), profile("Admin"))
        .await;
    assert_eq!(assert_granted(&again).role, Role::Admin);
    assert_eq!(h.roster.admin().await.unwrap().id, UserId::new("u2"));
}

#[tokio::test]
async fn rejoin_merges_and_preserves_number() {
    let h = harness();
    assert_granted(
        &h.gate
            .join(
                ConnectionId::generate(),
                UserId::new("u1"),
                profile_with_number("Ann", "555"),
            )
            .await,
    );

    // 不带号码的重连不清空已有号码
    let merged = h
        .gate
        .join(ConnectionId::generate(), UserId::new("u1"), profile("Annie"))
        .await;
    let user = assert_granted(&merged);
    assert_eq!(user.username, "Annie");
    assert_eq!(user.phone_number, "555");
}

#[tokio::test]
async fn at_most_one_admin_at_any_snapshot() {
    let h = harness();
    for (id, name) in [("u1", "Admin"), ("u2", "Admin"), ("u3", "Ann"), ("u4", "Admin")] {
        let _ = h
            .gate
            .join(ConnectionId::generate(), UserId::new(id), profile(name))
            .await;
        let admins = h
            .roster
            .all()
            .await
            .into_iter()
            .filter(|u| u.is_admin())
            .count();
        assert!(admins <= 1, "admin invariant violated after {id}");
    }
}
