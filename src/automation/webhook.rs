//! Inbound column-change webhooks.
//!
//! The platform disables subscriptions that keep failing and retries failed
//! deliveries, so this boundary always produces a JSON body for an HTTP 200:
//! malformed input becomes a `change_logged` no-op and any failure below,
//! panics included, becomes `remote_error`.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use serde_json::{Value, json};

use super::api::AppState;
use super::models::{ColumnChangeEvent, ColumnType, MoveOutcome, MoveStatus};

/// What an inbound body turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookPayload {
    /// Subscription handshake; the token must be echoed back unchanged.
    Challenge(Value),
    Event(ColumnChangeEvent),
    Malformed(String),
}

/// Classify a raw request body. Never fails.
pub fn parse_payload(body: &[u8]) -> WebhookPayload {
    let root: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            return WebhookPayload::Malformed(format!("body is not valid JSON: {}", e));
        }
    };
    let Some(obj) = root.as_object() else {
        return WebhookPayload::Malformed("body is not a JSON object".to_string());
    };

    if let Some(token) = obj.get("challenge").filter(|t| is_present(t)) {
        return WebhookPayload::Challenge(token.clone());
    }

    // monday.com nests event fields under `event`; older integrations post
    // them at the top level.
    let fields = obj.get("event").filter(|e| e.is_object()).unwrap_or(&root);

    let Some(item_id) = id_field(fields, "pulseId") else {
        return WebhookPayload::Malformed("missing pulseId".to_string());
    };

    WebhookPayload::Event(ColumnChangeEvent {
        item_name: string_field(fields, "pulseName").unwrap_or_default(),
        board_id: id_field(fields, "boardId"),
        column_title: string_field(fields, "columnTitle"),
        column_type: string_field(fields, "columnType")
            .map(|t| ColumnType::from_wire(&t))
            .unwrap_or(ColumnType::Other),
        raw_value: fields.get("value").cloned(),
        previous_value: fields.get("previousValue").cloned(),
        column_id: string_field(fields, "columnId").unwrap_or_else(|| "unknown".to_string()),
        item_id,
    })
}

/// A handshake token counts only when it carries something: null, `false`
/// and blank strings are treated as absent.
fn is_present(token: &Value) -> bool {
    match token {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn string_field(fields: &Value, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Ids may be strings or numbers on the wire.
pub(crate) fn id_field(fields: &Value, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(_) => string_field(fields, key),
        _ => None,
    }
}

/// Body returned for every non-handshake delivery.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub action: MoveStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    /// Update posted on the item instead of a move.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_id: Option<String>,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_groups: Vec<String>,
}

impl WebhookResponse {
    /// Map an outcome to the response echoed back to the caller.
    pub fn from_outcome(outcome: MoveOutcome, reason: &str) -> Self {
        let message = match outcome.status {
            MoveStatus::NoActionNeeded => format!("Column change recorded: {}", reason),
            MoveStatus::AlreadyInTarget => "Item already in Done group".to_string(),
            MoveStatus::MovedAndVerified => format!("Automation triggered: {}", reason),
            MoveStatus::MovedButUnverified => {
                "Move appeared to succeed but verification failed".to_string()
            }
            MoveStatus::NoTargetGroup => format!("{} but no Done group found", reason),
            MoveStatus::RemoteError => "Failed to move item".to_string(),
        };
        let verified = match outcome.status {
            MoveStatus::MovedAndVerified => Some(true),
            MoveStatus::MovedButUnverified => Some(false),
            _ => None,
        };
        Self {
            success: outcome.status.is_success(),
            action: outcome.status,
            message,
            item_id: None,
            item_name: None,
            column_id: None,
            from_group: outcome.from_group,
            to_group: outcome.to_group,
            reason: (!reason.is_empty()).then(|| reason.to_string()),
            verified,
            update_id: None,
            detail: outcome.detail,
            available_groups: outcome.available_groups,
        }
    }

    pub fn for_item(mut self, item_id: &str, item_name: &str) -> Self {
        self.item_id = Some(item_id.to_string());
        if !item_name.is_empty() {
            self.item_name = Some(item_name.to_string());
        }
        self
    }

    fn ignored(reason: String) -> Self {
        Self {
            success: true,
            action: MoveStatus::NoActionNeeded,
            message: format!("Column change ignored: {}", reason),
            item_id: None,
            item_name: None,
            column_id: None,
            from_group: None,
            to_group: None,
            reason: None,
            verified: None,
            update_id: None,
            detail: reason,
            available_groups: Vec::new(),
        }
    }
}

/// Body for a delivery whose bytes could not be read at all.
pub fn unreadable_body(reason: &str) -> Value {
    tracing::warn!(%reason, "Ignoring unreadable webhook body");
    to_json(WebhookResponse::ignored(format!("body could not be read: {}", reason)))
}

/// Handle one delivery end to end and return the JSON body to send.
pub async fn handle_webhook(state: &AppState, body: &[u8]) -> Value {
    let event = match parse_payload(body) {
        WebhookPayload::Challenge(token) => {
            tracing::info!("Webhook challenge received");
            return json!({ "challenge": token });
        }
        WebhookPayload::Malformed(reason) => {
            tracing::warn!(%reason, "Ignoring malformed webhook payload");
            return to_json(WebhookResponse::ignored(reason));
        }
        WebhookPayload::Event(event) => event,
    };

    tracing::info!(
        item_id = %event.item_id,
        item_name = %event.item_name,
        column_id = %event.column_id,
        column_type = event.column_type.as_str(),
        "Column change received"
    );

    let classification = state.classifier.classify(&event);
    let board_id = event
        .board_id
        .clone()
        .or_else(|| state.config.monday.board_id.clone());

    let outcome = match board_id {
        _ if !classification.is_completion_signal => {
            MoveOutcome::no_action(classification.reason.clone())
        }
        None => MoveOutcome::no_action("event carries no boardId and none is configured"),
        Some(board_id) => {
            let reconcile = state
                .reconciler
                .reconcile(&event.item_id, &board_id, &classification);
            match AssertUnwindSafe(reconcile).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(item_id = %event.item_id, "Reconciliation panicked");
                    MoveOutcome::remote_error("internal error while reconciling")
                }
            }
        }
    };

    tracing::info!(action = %outcome.status, detail = %outcome.detail, "Webhook handled");

    let mut response = WebhookResponse::from_outcome(outcome, &classification.reason)
        .for_item(&event.item_id, &event.item_name);
    response.column_id = Some(event.column_id);
    to_json(response)
}

fn to_json(response: WebhookResponse) -> Value {
    serde_json::to_value(&response).unwrap_or_else(|e| {
        json!({ "success": false, "action": "remote_error", "detail": e.to_string() })
    })
}
