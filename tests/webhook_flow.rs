//! End-to-end webhook scenarios: HTTP request in, board state and JSON out,
//! against an in-memory board.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use board_automator::automation::api::AppState;
use board_automator::automation::fake::FakeBoardClient;
use board_automator::automation::models::Group;
use board_automator::automation::server::build_router;
use board_automator::config::AutomationConfig;

fn board(groups: Vec<Group>, item_group: Group) -> Arc<FakeBoardClient> {
    let fake = FakeBoardClient::new();
    fake.add_board("9", groups);
    fake.add_item("1", "Write release notes", item_group);
    Arc::new(fake)
}

fn standard_board() -> Arc<FakeBoardClient> {
    board(
        vec![Group::new("w", "Working on it"), Group::new("d", "Done")],
        Group::new("w", "Working on it"),
    )
}

fn app(fake: &Arc<FakeBoardClient>) -> Router {
    build_router(Arc::new(AppState::new(
        AutomationConfig::default(),
        fake.clone(),
    )))
}

async fn deliver(app: Router, body: impl Into<Body>) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn status_done_event() -> String {
    json!({
        "pulseId": "1",
        "boardId": "9",
        "columnType": "color",
        "value": {"label": "Done", "index": 1}
    })
    .to_string()
}

#[tokio::test]
async fn handshake_echoes_token_without_remote_calls() {
    let fake = standard_board();
    let response = deliver(app(&fake), json!({"challenge": "abc123"}).to_string()).await;
    assert_eq!(response, json!({"challenge": "abc123"}));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn status_done_moves_and_verifies() {
    let fake = standard_board();
    let response = deliver(app(&fake), status_done_event()).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["action"], "moved_and_verified");
    assert_eq!(response["verified"], true);
    assert_eq!(response["fromGroup"], "Working on it");
    assert_eq!(response["toGroup"], "Done");
    assert_eq!(response["itemId"], "1");
    assert_eq!(fake.group_of("1").as_deref(), Some("d"));
    assert_eq!(fake.count("move_item_to_group"), 1);
}

#[tokio::test]
async fn item_already_in_done_is_not_moved() {
    let fake = board(
        vec![Group::new("w", "Working on it"), Group::new("d", "Done")],
        Group::new("d", "Done"),
    );
    let response = deliver(app(&fake), status_done_event()).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["action"], "already_in_target");
    assert_eq!(fake.count("move_item_to_group"), 0);
}

#[tokio::test]
async fn redelivery_is_idempotent() {
    let fake = standard_board();
    let first = deliver(app(&fake), status_done_event()).await;
    let second = deliver(app(&fake), status_done_event()).await;

    assert_eq!(first["action"], "moved_and_verified");
    assert_eq!(second["action"], "already_in_target");
    assert_eq!(fake.count("move_item_to_group"), 1);
}

#[tokio::test]
async fn board_without_done_group_lists_titles() {
    let fake = board(
        vec![Group::new("w", "Working on it"), Group::new("s", "Stuck")],
        Group::new("w", "Working on it"),
    );
    let response = deliver(app(&fake), status_done_event()).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["action"], "no_target_group");
    assert_eq!(response["availableGroups"], json!(["Working on it", "Stuck"]));
    assert_eq!(fake.count("move_item_to_group"), 0);
}

#[tokio::test]
async fn non_done_status_is_logged_only() {
    let fake = standard_board();
    let body = json!({
        "pulseId": "1", "boardId": "9", "columnType": "status",
        "value": {"label": "Working on it", "index": 0}
    });
    let response = deliver(app(&fake), body.to_string()).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["action"], "change_logged");
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn checkbox_in_nested_envelope_moves_item() {
    let fake = standard_board();
    let body = json!({"event": {
        "pulseId": 1, "pulseName": "Write release notes", "boardId": 9,
        "columnId": "check", "columnType": "checkbox",
        "value": {"checked": "true"}
    }});
    let response = deliver(app(&fake), body.to_string()).await;

    assert_eq!(response["action"], "moved_and_verified");
    assert_eq!(response["itemName"], "Write release notes");
}

#[tokio::test]
async fn malformed_bodies_are_acknowledged_as_no_ops() {
    let fake = standard_board();
    for body in ["", "not json", "[]", r#"{"boardId": "9"}"#] {
        let response = deliver(app(&fake), body.to_string()).await;
        assert_eq!(response["success"], true, "body {:?}", body);
        assert_eq!(response["action"], "change_logged", "body {:?}", body);
    }
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn oversized_body_is_acknowledged_with_200() {
    let fake = standard_board();
    let padding = "x".repeat(3 * 1024 * 1024);
    let body = json!({
        "pulseId": "1", "boardId": "9", "columnType": "color",
        "value": {"label": "Done"}, "padding": padding
    });
    let response = deliver(app(&fake), body.to_string()).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["action"], "change_logged");
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn null_challenge_does_not_swallow_event() {
    let fake = standard_board();
    let body = json!({
        "challenge": null, "pulseId": "1", "boardId": "9",
        "columnType": "color", "value": {"label": "Done"}
    });
    let response = deliver(app(&fake), body.to_string()).await;

    assert_eq!(response["action"], "moved_and_verified");
    assert_eq!(fake.group_of("1").as_deref(), Some("d"));
}

#[tokio::test]
async fn missing_board_id_falls_back_to_configured_board() {
    let fake = standard_board();
    let mut config = AutomationConfig::default();
    config.monday.board_id = Some("9".into());
    let app = build_router(Arc::new(AppState::new(config, fake.clone())));
    let body = json!({
        "pulseId": "1", "columnType": "color", "value": {"label": "Done"}
    });
    let response = deliver(app, body.to_string()).await;

    assert_eq!(response["action"], "moved_and_verified");
    assert!(fake.calls().contains(&"get_groups:9".to_string()));
}

#[tokio::test]
async fn missing_board_id_without_configuration_is_no_op() {
    let fake = standard_board();
    let body = json!({
        "pulseId": "1", "columnType": "color", "value": {"label": "Done"}
    });
    let response = deliver(app(&fake), body.to_string()).await;

    assert_eq!(response["action"], "change_logged");
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn remote_failure_is_reported_with_200() {
    let fake = standard_board();
    fake.fail("move_item_to_group", "Item is archived");
    let response = deliver(app(&fake), status_done_event()).await;

    assert_eq!(response["success"], false);
    assert_eq!(response["action"], "remote_error");
    assert!(response["detail"].as_str().unwrap().contains("Item is archived"));
}

#[tokio::test]
async fn stale_verification_is_not_upgraded() {
    let fake = standard_board();
    fake.set_ignore_moves(true);
    let response = deliver(app(&fake), status_done_event()).await;

    assert_eq!(response["success"], false);
    assert_eq!(response["action"], "moved_but_unverified");
    assert_eq!(response["verified"], false);
}

#[tokio::test]
async fn panic_below_the_boundary_becomes_remote_error() {
    let fake = standard_board();
    fake.set_panic_on_get_item(true);
    let response = deliver(app(&fake), status_done_event()).await;

    assert_eq!(response["success"], false);
    assert_eq!(response["action"], "remote_error");
}
