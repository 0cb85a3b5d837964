use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use workdesk_api::{AppStateInner, router};
use workdesk_core::Messenger;
use workdesk_db::Database;
use workdesk_types::api::Claims;
use workdesk_types::models::{NotificationType, Role};

const SECRET: &str = "test-secret";

struct Harness {
    app: Router,
    messenger: Messenger,
}

fn harness() -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.upsert_account(1, "boss@corp", "manager").unwrap();
    db.upsert_account(5, "eve@corp", "employee").unwrap();
    db.upsert_account(7, "gus@corp", "employee").unwrap();
    db.upsert_account(9, "ivy@corp", "director").unwrap();

    let messenger = Messenger::with_local_directory(db);
    let app = router(AppStateInner::new(messenger.clone(), SECRET));
    Harness { app, messenger }
}

fn token(sub: i64, role: Role) -> String {
    let claims = Claims {
        sub,
        email: format!("{sub}@corp"),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn call(app: &Router, method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = auth {
        builder = builder.header("authorization", format!("Bearer {t}"));
    }
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

#[tokio::test]
async fn requests_without_valid_token_are_rejected() {
    let h = harness();

    let (status, _) = call(&h.app, "GET", "/conversations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&h.app, "GET", "/conversations", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AUTHENTICATION");

    let (status, _) = call(&h.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn broadcast_reminder_reaches_employees() {
    let h = harness();
    let boss = token(1, Role::Manager);

    let (status, body) = call(
        &h.app,
        "POST",
        "/messages",
        Some(&boss),
        Some(json!({ "body": "Reminder", "recipient_role": "employee" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["conversation_key"], "dm:1:5");
    assert_eq!(body["broadcast"]["sent"], 2);
    assert_eq!(body["broadcast"]["failed"], json!([]));

    for (id, key) in [(5, "dm:1:5"), (7, "dm:1:7")] {
        let t = token(id, Role::Employee);
        let (_, list) = call(&h.app, "GET", "/conversations", Some(&t), None).await;
        assert_eq!(list[0]["conversation_key"], key);
        assert_eq!(list[0]["participant"], 1);
        assert_eq!(list[0]["participant_role"], "manager");
        assert_eq!(list[0]["unread_count"], 1);

        let (_, notes) = call(&h.app, "GET", "/notifications?type=MESSAGE&is_read=false", Some(&t), None).await;
        assert_eq!(notes.as_array().unwrap().len(), 1);
        assert_eq!(notes[0]["link_to"], format!("/messages/{key}"));
    }
}

#[tokio::test]
async fn retry_resends_only_to_listed_recipients() {
    let h = harness();
    let boss = token(1, Role::Manager);

    let (status, body) = call(
        &h.app,
        "POST",
        "/messages/broadcast/retry",
        Some(&boss),
        Some(json!({ "recipient_role": "employee", "recipient_ids": [7, 404], "body": "Reminder" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batch_key"], "bc:1:employee");
    assert_eq!(body["sent"], 1);
    assert_eq!(body["failed"], json!([{ "recipient_id": 404, "reason": "unknown recipient" }]));

    let (_, five) = call(&h.app, "GET", "/conversations", Some(&token(5, Role::Employee)), None).await;
    assert_eq!(five, json!([]));
    let (_, seven) = call(&h.app, "GET", "/conversations", Some(&token(7, Role::Employee)), None).await;
    assert_eq!(seven[0]["conversation_key"], "dm:1:7");

    let (status, _) = call(
        &h.app,
        "POST",
        "/messages/broadcast/retry",
        Some(&token(5, Role::Employee)),
        Some(json!({ "recipient_role": "employee", "recipient_ids": [7], "body": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn employees_cannot_broadcast() {
    let h = harness();
    let eve = token(5, Role::Employee);
    let (status, body) = call(
        &h.app,
        "POST",
        "/messages",
        Some(&eve),
        Some(json!({ "body": "party!", "recipient_role": "employee" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "AUTHORIZATION");
}

#[tokio::test]
async fn thread_is_private_to_participants() {
    let h = harness();
    let boss = token(1, Role::Manager);
    call(&h.app, "POST", "/messages", Some(&boss), Some(json!({ "body": "hi", "recipient_id": 5 }))).await;

    let (status, thread) =
        call(&h.app, "GET", "/conversations/dm:1:5/messages", Some(&token(5, Role::Employee)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread[0]["body"], "hi");
    assert_eq!(thread[0]["message_type"], "DIRECT");

    let (status, _) =
        call(&h.app, "GET", "/conversations/dm:1:5/messages", Some(&token(9, Role::Director)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) =
        call(&h.app, "GET", "/conversations/dm:4:8/messages", Some(&token(4, Role::Employee)), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fetch_then_mark_read_is_idempotent() {
    let h = harness();
    let boss = token(1, Role::Manager);
    let eve = token(5, Role::Employee);
    for body in ["one", "two"] {
        call(&h.app, "POST", "/messages", Some(&boss), Some(json!({ "body": body, "recipient_id": 5 }))).await;
    }

    let (_, thread) = call(&h.app, "GET", "/conversations/dm:1:5/messages", Some(&eve), None).await;
    assert!(thread.as_array().unwrap().iter().all(|m| m["is_read"] == false));

    let (_, first) = call(&h.app, "POST", "/conversations/dm:1:5/read", Some(&eve), None).await;
    assert_eq!(first["updated"], 2);
    let (_, second) = call(&h.app, "POST", "/conversations/dm:1:5/read", Some(&eve), None).await;
    assert_eq!(second["updated"], 0);

    let (_, count) = call(&h.app, "GET", "/messages/unread-count", Some(&eve), None).await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn invalid_sends_are_bad_requests() {
    let h = harness();
    let eve = token(5, Role::Employee);

    let (status, body) =
        call(&h.app, "POST", "/messages", Some(&eve), Some(json!({ "body": "   ", "recipient_id": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION");

    let (status, _) =
        call(&h.app, "POST", "/messages", Some(&eve), Some(json!({ "body": "me", "recipient_id": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&h.app, "POST", "/messages", Some(&eve), Some(json!({ "body": "lost", "recipient_id": 404 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notification_inbox_respects_ownership() {
    let h = harness();
    let leave = h
        .messenger
        .notifications()
        .publish(5, "Leave approved", "Mon-Wed", NotificationType::Leave, Some("/leave/3"))
        .unwrap();
    h.messenger
        .notifications()
        .publish(5, "Policy update", "", NotificationType::Info, None)
        .unwrap();

    let uri = format!("/notifications/{}/read", leave.id);
    let (status, _) = call(&h.app, "POST", &uri, Some(&token(7, Role::Employee)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let eve = token(5, Role::Employee);
    let (status, _) = call(&h.app, "POST", &uri, Some(&eve), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, leave_only) = call(&h.app, "GET", "/notifications?type=leave", Some(&eve), None).await;
    assert_eq!(leave_only.as_array().unwrap().len(), 1);
    assert_eq!(leave_only[0]["type"], "LEAVE");

    let (_, unread) = call(&h.app, "GET", "/notifications?is_read=false", Some(&eve), None).await;
    assert_eq!(unread.as_array().unwrap().len(), 1);
    assert_eq!(unread[0]["type"], "INFO");

    let (_, all) = call(&h.app, "POST", "/notifications/read-all", Some(&eve), None).await;
    assert_eq!(all["count"], 1);
    let (_, badge) = call(&h.app, "GET", "/notifications/unread-count", Some(&eve), None).await;
    assert_eq!(badge["count"], 0);

    let (status, _) = call(&h.app, "POST", "/notifications/999/read", Some(&eve), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
