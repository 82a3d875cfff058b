//! Integration tests for the notification inbox and dispatcher.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, create_admin, create_user, get_auth, notification_titles,
    patch_json_auth, token_for,
};
use homelift_server::notification::{NewNotification, NotificationType, Notifier, SourceRef};
use homelift_server::websocket::WsState;
use serde_json::json;
use sqlx::PgPool;

fn booking_notice(recipient_id: Option<i64>, title: &str) -> NewNotification {
    NewNotification {
        recipient_id,
        sender_id: None,
        kind: NotificationType::Booking,
        title: title.to_string(),
        message: format!("{} message", title),
        source: SourceRef::Booking(1),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_is_newest_first_and_scoped(pool: PgPool) {
    let alice = create_user(&pool, "alice").await;
    let bob = create_user(&pool, "bob").await;
    let notifier = Notifier::new(pool.clone(), WsState::new(), None);

    notifier.dispatch(booking_notice(Some(alice), "First")).await.unwrap();
    notifier.dispatch(booking_notice(Some(alice), "Second")).await.unwrap();
    notifier.dispatch(booking_notice(Some(bob), "For Bob")).await.unwrap();
    let app = build_test_app(pool);

    let response = get_auth(app, "/notification/", &token_for(alice)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let items = json["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Second");
    assert_eq!(items[1]["title"], "First");
    assert_eq!(items[0]["type"], "booking");
    assert_eq!(items[0]["sender_name"], "System");
    assert_eq!(items[0]["is_read"], false);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_mark_read_is_scoped_to_recipient(pool: PgPool) {
    let alice = create_user(&pool, "alice").await;
    let bob = create_user(&pool, "bob").await;
    let notifier = Notifier::new(pool.clone(), WsState::new(), None);
    let stored = notifier
        .dispatch(booking_notice(Some(alice), "Booking Cancelled"))
        .await
        .unwrap();
    let app = build_test_app(pool.clone());
    let uri = format!("/notification/{}/mark-read/", stored.id);

    let response = patch_json_auth(app.clone(), &uri, &token_for(bob), json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for _ in 0..2 {
        let response = patch_json_auth(app.clone(), &uri, &token_for(alice), json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["detail"], "Notification marked as read.");
    }

    let is_read: bool = sqlx::query_scalar("SELECT is_read FROM notifications WHERE id = $1")
        .bind(stored.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(is_read);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_missing_recipient_falls_back_to_system_user(pool: PgPool) {
    let system = create_admin(&pool, "system").await;
    let notifier = Notifier::new(pool.clone(), WsState::new(), Some(system));

    let stored = notifier
        .dispatch(booking_notice(Some(987_654), "Booking Cancelled"))
        .await
        .unwrap();
    assert_eq!(stored.recipient_id, system);

    let stored = notifier
        .dispatch(booking_notice(None, "New Provider Application"))
        .await
        .unwrap();
    assert_eq!(stored.recipient_id, system);

    assert_eq!(
        notification_titles(&pool, system).await,
        vec!["Booking Cancelled", "New Provider Application"]
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_undeliverable_notification_is_dropped(pool: PgPool) {
    let notifier = Notifier::new(pool.clone(), WsState::new(), None);
    assert!(notifier
        .dispatch(booking_notice(Some(987_654), "Booking Cancelled"))
        .await
        .is_none());

    let notifier = Notifier::new(pool.clone(), WsState::new(), Some(555_555));
    assert!(notifier
        .dispatch(booking_notice(Some(987_654), "Booking Cancelled"))
        .await
        .is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_stored_notification_is_pushed_live(pool: PgPool) {
    let alice = create_user(&pool, "alice").await;
    let ws_state = WsState::new();
    let mut rx = ws_state.tx.subscribe();
    let notifier = Notifier::new(pool.clone(), ws_state, None);

    let stored = notifier
        .dispatch(booking_notice(Some(alice), "Booking Accepted"))
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.user_id, alice);
    assert_eq!(event.notification.id, stored.id);
}
