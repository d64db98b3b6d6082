mod support;

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

use support::{connect_ws, join, recv_event_of, send_event, spawn_app, spawn_app_with_secret};

#[tokio::test]
async fn admin_login_requires_matching_secret() {
    let addr = spawn_app().await;

    let mut bad = connect_ws(addr).await;
    send_event(&mut bad, json!({ "type": "admin_login", "secret": "wrong" })).await;
    let error = recv_event_of(&mut bad, "error").await;
    assert!(error["message"].as_str().unwrap().contains("permiso"));

    let mut ops = connect_ws(addr).await;
    send_event(&mut ops, json!({ "type": "admin_login", "secret": "s3cret" })).await;
    recv_event_of(&mut ops, "admin_ok").await;
    recv_event_of(&mut ops, "admin_user_list").await;
}

#[tokio::test]
async fn empty_secret_disables_admin_channel() {
    let addr = spawn_app_with_secret("").await;
    let mut ops = connect_ws(addr).await;
    send_event(&mut ops, json!({ "type": "admin_login", "secret": "" })).await;
    recv_event_of(&mut ops, "error").await;
}

#[tokio::test]
async fn admin_channel_manages_users() {
    let addr = spawn_app().await;
    let mut a = connect_ws(addr).await;
    join(&mut a, "u1", "Ann").await;

    let mut ops = connect_ws(addr).await;
    send_event(&mut ops, json!({ "type": "admin_login", "secret": "s3cret" })).await;
    recv_event_of(&mut ops, "admin_ok").await;
    // 握手自带的第一份名册
    recv_event_of(&mut ops, "admin_user_list").await;

    send_event(
        &mut ops,
        json!({
            "type": "admin_create_user",
            "admin_id": "ops",
            "new_user": { "id": "u9", "username": "Nuevo" }
        }),
    )
    .await;

    // 管理通道收到更新后的名册
    let list = recv_event_of(&mut ops, "admin_user_list").await;
    assert!(list["users"]
        .as_array()
        .unwrap()
        .iter()
        .any(|u| u["id"] == "u9"));

    send_event(
        &mut ops,
        json!({
            "type": "admin_update_user",
            "admin_id": "ops",
            "user_id": "u9",
            "update": { "name": "Renombrado" }
        }),
    )
    .await;
    let updated = recv_event_of(&mut ops, "admin_user_list").await;
    assert!(updated["users"]
        .as_array()
        .unwrap()
        .iter()
        .any(|u| u["username"] == "Renombrado"));
}

#[tokio::test]
async fn plain_user_cannot_invoke_admin_operations() {
    let addr = spawn_app().await;
    let mut a = connect_ws(addr).await;
    join(&mut a, "u1", "Ann").await;

    send_event(
        &mut a,
        json!({ "type": "admin_get_all_users", "admin_id": "u1" }),
    )
    .await;
    let error = recv_event_of(&mut a, "error").await;
    assert!(error["message"].as_str().unwrap().contains("permiso"));
}

#[tokio::test]
async fn update_profile_cannot_grant_admin_role() {
    let addr = spawn_app().await;
    let mut a = connect_ws(addr).await;
    let login = join(&mut a, "u1", "Ann").await;
    assert_eq!(login["user"]["role"], "user");
    recv_event_of(&mut a, "user_list").await;

    // 普通资料编辑携带角色字段：字段被忽略，角色不变
    send_event(
        &mut a,
        json!({
            "type": "update_profile",
            "user_id": "u1",
            "profile": { "name": "Ann", "role": "admin" }
        }),
    )
    .await;
    let list = recv_event_of(&mut a, "user_list").await;
    assert_eq!(list["users"][0]["role"], "user");

    // 管理操作依旧被拒
    send_event(
        &mut a,
        json!({ "type": "admin_get_all_users", "admin_id": "u1" }),
    )
    .await;
    let error = recv_event_of(&mut a, "error").await;
    assert!(error["message"].as_str().unwrap().contains("permiso"));
}

#[tokio::test]
async fn update_profile_cannot_resurrect_deleted_user() {
    let addr = spawn_app().await;
    let mut target = connect_ws(addr).await;
    join(&mut target, "u1", "Ann").await;

    let mut ops = connect_ws(addr).await;
    send_event(&mut ops, json!({ "type": "admin_login", "secret": "s3cret" })).await;
    recv_event_of(&mut ops, "admin_ok").await;
    send_event(
        &mut ops,
        json!({ "type": "admin_delete_user", "admin_id": "ops", "user_id": "u1" }),
    )
    .await;
    recv_event_of(&mut target, "user_deleted").await;

    // 第三方替已删除的 id 发资料编辑：不建档、不广播
    let mut b = connect_ws(addr).await;
    join(&mut b, "u2", "Bob").await;
    send_event(
        &mut b,
        json!({
            "type": "update_profile",
            "user_id": "u1",
            "profile": { "name": "Zombi" }
        }),
    )
    .await;
    sleep(Duration::from_millis(50)).await;

    // 下一次名册广播里没有 u1
    let mut c = connect_ws(addr).await;
    join(&mut c, "u3", "Eva").await;
    recv_event_of(&mut b, "user_list").await;
    let list = recv_event_of(&mut b, "user_list").await;
    let users = list["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u["id"] != "u1"));
}

#[tokio::test]
async fn delete_forces_logout_and_blocks_rejoin() {
    let addr = spawn_app().await;
    let mut target = connect_ws(addr).await;
    join(&mut target, "u1", "Ann").await;

    let mut ops = connect_ws(addr).await;
    send_event(&mut ops, json!({ "type": "admin_login", "secret": "s3cret" })).await;
    recv_event_of(&mut ops, "admin_ok").await;

    send_event(
        &mut ops,
        json!({ "type": "admin_delete_user", "admin_id": "ops", "user_id": "u1" }),
    )
    .await;

    // 目标先收到清空指令，随后连接被关闭
    recv_event_of(&mut target, "user_deleted").await;
    loop {
        match target.next().await {
            Some(Ok(TungsteniteMessage::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(_)) => break,
        }
    }

    // 墓碑是永久的：重连被拒并再次要求清空本地身份
    sleep(Duration::from_millis(50)).await;
    let mut again = connect_ws(addr).await;
    send_event(
        &mut again,
        json!({ "type": "join", "user_id": "u1", "profile": { "name": "Otra" } }),
    )
    .await;
    recv_event_of(&mut again, "user_deleted").await;
    let error = recv_event_of(&mut again, "error").await;
    assert!(error["message"].as_str().unwrap().contains("desactivada"));
}

#[tokio::test]
async fn roster_admin_can_delete_without_admin_channel() {
    let addr = spawn_app().await;
    let mut target = connect_ws(addr).await;
    join(&mut target, "u1", "Ann").await;

    let mut admin = connect_ws(addr).await;
    join(&mut admin, "u2", "Admin").await;

    send_event(
        &mut admin,
        json!({ "type": "admin_delete_user", "admin_id": "u2", "user_id": "u1" }),
    )
    .await;

    recv_event_of(&mut target, "user_deleted").await;
}
