use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::Instrument;

use super::admin;
use super::board_client::BoardClient;
use super::classifier::StatusClassifier;
use super::reconciler::Reconciler;
use super::resolver::GroupResolver;
use super::webhook;
use crate::config::AutomationConfig;
use crate::errors::{AdminError, BoardError};

// ── Shared application state ──────────────────────────────────────────

/// Everything a request needs, built once from configuration at startup.
pub struct AppState {
    pub config: AutomationConfig,
    pub classifier: StatusClassifier,
    pub reconciler: Reconciler,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AutomationConfig, client: Arc<dyn BoardClient>) -> Self {
        let classifier = StatusClassifier::new(&config.rules);
        let reconciler = Reconciler::new(client, GroupResolver::new(&config.rules));
        Self {
            config,
            classifier,
            reconciler,
        }
    }

    pub fn client(&self) -> &dyn BoardClient {
        self.reconciler.client().as_ref()
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LinkActionQuery {
    #[serde(rename = "itemId")]
    pub item_id: Option<String>,
    pub action: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (
            status,
            Json(serde_json::json!({"success": false, "error": message})),
        )
            .into_response()
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        let message = err.to_string();
        match err {
            AdminError::Precondition(_) => ApiError::BadRequest(message),
            AdminError::Board(BoardError::MissingData(_)) => ApiError::NotFound(message),
            AdminError::Board(_) => ApiError::BadGateway(message),
            AdminError::Config(_) => ApiError::Internal(message),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/webhook", post(receive_webhook))
        .route("/webhook/checkbox", post(receive_webhook))
        .route("/webhook/test", get(webhook_test))
        .route("/api/tasks", get(list_tasks))
        .route("/api/webhooks", post(create_webhook).delete(delete_webhooks))
        .route("/api/board", get(board_structure))
        .route("/api/link-buttons", post(create_link_buttons))
        .route("/api/link-action", get(link_action))
        .route("/api/debug", get(diagnose))
        .route("/integration/button-clicked", post(button_clicked))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// Always answers 200; see `webhook::handle_webhook`. A body that cannot be
/// buffered (over the size limit, aborted) is acknowledged as a no-op.
async fn receive_webhook(
    State(state): State<SharedState>,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    let delivery_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("webhook", %delivery_id);
    let response = match body {
        Ok(body) => {
            webhook::handle_webhook(&state, &body)
                .instrument(span)
                .await
        }
        Err(rejection) => span.in_scope(|| webhook::unreadable_body(&rejection.body_text())),
    };
    (StatusCode::OK, Json(response))
}

async fn webhook_test() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "message": "Webhook endpoint is reachable",
        "endpoints": ["POST /webhook", "POST /webhook/checkbox"],
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn list_tasks(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(admin::list_tasks(&state).await?))
}

async fn create_webhook(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let setup = admin::setup_webhook(&state).await?;
    Ok((StatusCode::CREATED, Json(setup)))
}

async fn delete_webhooks(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(admin::delete_webhooks(&state).await?))
}

async fn board_structure(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(admin::board_structure(&state).await?))
}

async fn create_link_buttons(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(admin::create_link_buttons(&state).await?))
}

async fn link_action(
    State(state): State<SharedState>,
    Query(query): Query<LinkActionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let item_id = query
        .item_id
        .ok_or_else(|| ApiError::BadRequest("itemId is required".into()))?;
    let action = query.action.unwrap_or_else(|| "clicked".to_string());
    Ok(Json(admin::link_action(&state, &item_id, &action).await?))
}

async fn diagnose(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(admin::diagnose(&state).await?))
}

async fn button_clicked(
    State(state): State<SharedState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let click = admin::ButtonClick::from_body(&body)?;
    Ok(Json(admin::button_clicked(&state, &click).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::fake::FakeBoardClient;
    use crate::automation::models::{Column, Group};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> (Arc<FakeBoardClient>, Router) {
        let fake = FakeBoardClient::new();
        fake.add_board(
            "9",
            vec![Group::new("w", "Working on it"), Group::new("d", "Done")],
        );
        fake.add_columns(
            "9",
            vec![Column {
                id: "status".into(),
                title: "Status".into(),
                column_type: "color".into(),
            }],
        );
        fake.add_item("1", "Write docs", Group::new("w", "Working on it"));
        let fake = Arc::new(fake);
        let mut config = AutomationConfig::default();
        config.monday.board_id = Some("9".into());
        config.monday.token = Some("test-token".into());
        config.server.public_url = Some("https://hooks.example.com".into());
        let state = Arc::new(AppState::new(config, fake.clone()));
        (fake, api_router().with_state(state))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_, app) = test_app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_webhook_test_endpoint() {
        let (_, app) = test_app();
        let response = app.oneshot(get("/webhook/test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
    }

    #[tokio::test]
    async fn test_challenge_echo() {
        let (fake, app) = test_app();
        let response = app
            .oneshot(post_json("/webhook", serde_json::json!({"challenge": "abc123"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"challenge": "abc123"})
        );
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_checkbox_route() {
        let (fake, app) = test_app();
        let response = app
            .oneshot(post_json(
                "/webhook/checkbox",
                serde_json::json!({"event": {
                    "pulseId": 1, "boardId": 9, "columnId": "check",
                    "columnType": "checkbox", "value": {"checked": true}
                }}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["action"], "moved_and_verified");
        assert_eq!(fake.group_of("1").as_deref(), Some("d"));
    }

    #[tokio::test]
    async fn test_garbage_body_is_200_change_logged() {
        let (_, app) = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from("{{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["action"], "change_logged");
    }

    #[tokio::test]
    async fn test_list_tasks() {
        let (_, app) = test_app();
        let response = app.oneshot(get("/api/tasks")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["boardId"], "9");
        assert_eq!(json["taskCount"], 1);
        assert_eq!(json["tasks"][0]["group"], "Working on it");
    }

    #[tokio::test]
    async fn test_remote_failure_maps_to_bad_gateway() {
        let (fake, app) = test_app();
        fake.fail("list_items", "Internal server error");
        let response = app.oneshot(get("/api/tasks")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("Internal server error"));
    }

    #[tokio::test]
    async fn test_create_and_delete_webhooks() {
        let (fake, app) = test_app();
        let response = app
            .clone()
            .oneshot(post_json("/api/webhooks", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["webhookUrl"], "https://hooks.example.com/webhook");
        assert_eq!(fake.webhook_ids("9").len(), 1);

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/webhooks")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["deletedCount"], 1);
        assert_eq!(json["totalFound"], 1);
        assert!(fake.webhook_ids("9").is_empty());
    }

    #[tokio::test]
    async fn test_link_buttons_without_link_column_is_bad_request() {
        let (_, app) = test_app();
        let response = app
            .oneshot(post_json("/api/link-buttons", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_board_structure() {
        let (_, app) = test_app();
        let response = app.oneshot(get("/api/board")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["doneGroup"]["id"], "d");
        assert_eq!(json["statusColumns"][0]["id"], "status");
    }

    #[tokio::test]
    async fn test_link_action_moves_item() {
        let (fake, app) = test_app();
        let response = app
            .oneshot(get("/api/link-action?itemId=1&action=clicked"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["action"], "moved_and_verified");
        assert_eq!(json["itemId"], "1");
        assert_eq!(fake.group_of("1").as_deref(), Some("d"));
    }

    #[tokio::test]
    async fn test_link_action_without_item_id() {
        let (_, app) = test_app();
        let response = app.oneshot(get("/api/link-action")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_board_id_is_internal_error() {
        let fake: Arc<dyn BoardClient> = Arc::new(FakeBoardClient::new());
        let state = Arc::new(AppState::new(AutomationConfig::default(), fake));
        let app = api_router().with_state(state);
        let response = app.oneshot(get("/api/tasks")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_debug_reports_account_and_board() {
        let (_, app) = test_app();
        let response = app.oneshot(get("/api/debug")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["account"]["name"], "Test User");
        assert_eq!(json["board"]["permissions"], "everyone");
        assert_eq!(json["tokenLength"], 10);
    }

    #[tokio::test]
    async fn test_button_click_posts_update() {
        let (fake, app) = test_app();
        let response = app
            .oneshot(post_json(
                "/integration/button-clicked",
                serde_json::json!({"payload": {"itemId": 1, "boardId": 9, "userId": 4}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["action"], "comment_added");
        assert_eq!(json["itemId"], "1");
        assert_eq!(fake.updates("1").len(), 1);
    }

    #[tokio::test]
    async fn test_button_click_without_payload_is_bad_request() {
        let (fake, app) = test_app();
        let response = app
            .oneshot(post_json(
                "/integration/button-clicked",
                serde_json::json!({"itemId": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(fake.calls().is_empty());
    }
}
