//! Board administration: listings, webhook registration and cleanup, action
//! links, button clicks and connectivity checks. Shared by the HTTP admin
//! routes and the CLI.

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};

use super::api::AppState;
use super::board_client::CHANGE_COLUMN_VALUE_EVENT;
use super::models::{
    Account, BoardAccess, ClassificationResult, Column, Group, MoveStatus, Webhook,
};
use super::webhook::{WebhookResponse, id_field};
use crate::errors::AdminError;

/// Items fetched when listing tasks.
const TASK_LIST_LIMIT: u32 = 500;
/// Items considered when writing action links.
const LINK_SCAN_LIMIT: u32 = 100;
/// Update posted when an item's button column is clicked.
const BUTTON_CLICK_NOTE: &str = "Button clicked; recorded by board-automator.";
/// Update posted when an action link fires on a board with no Done group.
const NO_TARGET_NOTE: &str =
    "Action link clicked, but this board has no Done group to move the item into.";

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub name: String,
    pub group: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub success: bool,
    pub board_id: String,
    pub board_name: String,
    pub task_count: usize,
    pub tasks: Vec<TaskSummary>,
}

pub async fn list_tasks(state: &AppState) -> Result<TaskList, AdminError> {
    let board_id = state.config.board_id()?;
    let board = state.client().list_items(board_id, TASK_LIST_LIMIT).await?;
    let tasks: Vec<TaskSummary> = board
        .items
        .into_iter()
        .map(|item| TaskSummary {
            id: item.id,
            name: item.name,
            group: item.group.title,
        })
        .collect();
    Ok(TaskList {
        success: true,
        board_id: board.id,
        board_name: board.name,
        task_count: tasks.len(),
        tasks,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSetup {
    pub success: bool,
    pub webhook_id: String,
    pub board_id: String,
    pub webhook_url: String,
    pub event: String,
    pub status_columns: Vec<Column>,
}

/// Register a column-change webhook pointing at this server.
///
/// Refuses boards without a status-like column: such a subscription would
/// only ever deliver no-ops.
pub async fn setup_webhook(state: &AppState) -> Result<WebhookSetup, AdminError> {
    let board_id = state.config.board_id()?;
    let webhook_url = format!("{}/webhook", state.config.public_url()?);

    let columns = state.client().get_columns(board_id).await?;
    let status_columns = status_columns(state, &columns);
    if status_columns.is_empty() {
        let titles: Vec<&str> = columns.iter().map(|c| c.title.as_str()).collect();
        return Err(AdminError::Precondition(format!(
            "No status column found on board {}; columns: {}",
            board_id,
            titles.join(", ")
        )));
    }

    let subscription = state
        .client()
        .create_webhook(board_id, &webhook_url, CHANGE_COLUMN_VALUE_EVENT)
        .await?;
    tracing::info!(webhook_id = %subscription.id, url = %webhook_url, "Webhook registered");

    Ok(WebhookSetup {
        success: true,
        webhook_id: subscription.id,
        board_id: subscription.board_id,
        webhook_url,
        event: CHANGE_COLUMN_VALUE_EVENT.to_string(),
        status_columns,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCleanup {
    pub success: bool,
    pub deleted_count: usize,
    pub total_found: usize,
    pub failed: Vec<String>,
}

/// Delete every webhook on the board. A failed delete is reported, not
/// fatal; the rest are still attempted.
pub async fn delete_webhooks(state: &AppState) -> Result<WebhookCleanup, AdminError> {
    let board_id = state.config.board_id()?;
    let webhooks = state.client().list_webhooks(board_id).await?;

    let mut deleted_count = 0;
    let mut failed = Vec::new();
    for webhook in &webhooks {
        match state.client().delete_webhook(&webhook.id).await {
            Ok(_) => deleted_count += 1,
            Err(e) => {
                tracing::warn!(webhook_id = %webhook.id, error = %e, "Failed to delete webhook");
                failed.push(webhook.id.clone());
            }
        }
    }

    Ok(WebhookCleanup {
        success: failed.is_empty(),
        deleted_count,
        total_found: webhooks.len(),
        failed,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStructure {
    pub board_id: String,
    pub columns: Vec<Column>,
    pub status_columns: Vec<Column>,
    pub groups: Vec<Group>,
    pub webhooks: Vec<Webhook>,
    pub done_group: Option<Group>,
}

pub async fn board_structure(state: &AppState) -> Result<BoardStructure, AdminError> {
    let board_id = state.config.board_id()?;
    let client = state.client();
    let (columns, groups, webhooks) = futures::try_join!(
        client.get_columns(board_id),
        client.get_groups(board_id),
        client.list_webhooks(board_id),
    )?;
    let done_group = state.reconciler.resolver().resolve(&groups).cloned();
    Ok(BoardStructure {
        board_id: board_id.to_string(),
        status_columns: status_columns(state, &columns),
        columns,
        groups,
        webhooks,
        done_group,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkButtons {
    pub success: bool,
    pub link_column: String,
    pub column_id: String,
    pub items_updated: usize,
    pub items_failed: usize,
    pub total_items: usize,
}

/// Write an action link into the first `links.max_items` items.
pub async fn create_link_buttons(state: &AppState) -> Result<LinkButtons, AdminError> {
    let board_id = state.config.board_id()?;
    let public_url = state.config.public_url()?;
    let client = state.client();

    let columns = client.get_columns(board_id).await?;
    let column = columns
        .into_iter()
        .find(Column::is_link)
        .ok_or_else(|| {
            AdminError::Precondition(format!("No link column found on board {}", board_id))
        })?;

    let board = client.list_items(board_id, LINK_SCAN_LIMIT).await?;
    let targets: Vec<_> = board
        .items
        .iter()
        .take(state.config.links.max_items)
        .collect();

    let writes = targets.iter().map(|item| {
        let url = action_link(&public_url, &item.id);
        let mut values = serde_json::Map::new();
        values.insert(
            column.id.clone(),
            json!({ "url": url, "text": state.config.links.text }),
        );
        let values = serde_json::Value::Object(values);
        async move {
            let result = client.change_column_values(board_id, &item.id, values).await;
            if let Err(e) = &result {
                tracing::warn!(item_id = %item.id, error = %e, "Failed to write action link");
            }
            result
        }
    });
    let results = join_all(writes).await;
    let items_updated = results.iter().filter(|r| r.is_ok()).count();

    Ok(LinkButtons {
        success: items_updated == targets.len(),
        link_column: column.title,
        column_id: column.id,
        items_updated,
        items_failed: targets.len() - items_updated,
        total_items: board.items.len(),
    })
}

/// URL an action link points at for one item.
pub fn action_link(public_url: &str, item_id: &str) -> String {
    format!(
        "{}/api/link-action?itemId={}&action=clicked",
        public_url.trim_end_matches('/'),
        item_id
    )
}

/// Force completion of one item, as if a completion signal had arrived.
pub async fn link_action(
    state: &AppState,
    item_id: &str,
    action: &str,
) -> Result<WebhookResponse, AdminError> {
    let item_id = item_id.trim();
    if item_id.is_empty() {
        return Err(AdminError::Precondition("itemId is required".to_string()));
    }
    let board_id = state.config.board_id()?;
    let reason = format!("Action link \"{}\" triggered", action);
    tracing::info!(%item_id, %action, "Manual completion requested");
    let outcome = state
        .reconciler
        .reconcile(item_id, board_id, &ClassificationResult::manual(reason.clone()))
        .await;
    let mut response = WebhookResponse::from_outcome(outcome, &reason).for_item(item_id, "");

    // Nowhere to move the item: leave a note on it so the click is not lost.
    if response.action == MoveStatus::NoTargetGroup {
        match state.client().create_update(item_id, NO_TARGET_NOTE).await {
            Ok(update_id) => response.update_id = Some(update_id),
            Err(e) => tracing::warn!(%item_id, error = %e, "Failed to post fallback update"),
        }
    }
    Ok(response)
}

/// A click on a button column, as delivered by the platform integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonClick {
    pub item_id: String,
    pub board_id: Option<String>,
    pub column_id: Option<String>,
    pub user_id: Option<String>,
}

impl ButtonClick {
    /// Read `{"payload": {"itemId": .., "boardId": .., "columnId": .., "userId": ..}}`.
    pub fn from_body(body: &Value) -> Result<Self, AdminError> {
        let payload = body
            .get("payload")
            .filter(|p| p.is_object())
            .ok_or_else(|| AdminError::Precondition("payload is required".to_string()))?;
        let item_id = id_field(payload, "itemId")
            .ok_or_else(|| AdminError::Precondition("payload.itemId is required".to_string()))?;
        Ok(Self {
            item_id,
            board_id: id_field(payload, "boardId"),
            column_id: id_field(payload, "columnId"),
            user_id: id_field(payload, "userId"),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonClickResult {
    pub success: bool,
    pub message: String,
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    pub action: String,
    pub update_id: String,
    pub timestamp: String,
}

/// Record a button click as an update on the clicked item.
pub async fn button_clicked(
    state: &AppState,
    click: &ButtonClick,
) -> Result<ButtonClickResult, AdminError> {
    tracing::info!(
        item_id = %click.item_id,
        board_id = click.board_id.as_deref().unwrap_or("-"),
        column_id = click.column_id.as_deref().unwrap_or("-"),
        user_id = click.user_id.as_deref().unwrap_or("-"),
        "Button click received"
    );
    let update_id = state
        .client()
        .create_update(&click.item_id, BUTTON_CLICK_NOTE)
        .await?;
    Ok(ButtonClickResult {
        success: true,
        message: "Button click processed".to_string(),
        item_id: click.item_id.clone(),
        board_id: click.board_id.clone(),
        action: "comment_added".to_string(),
        update_id,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub success: bool,
    pub board_id: String,
    pub api_url: String,
    pub api_version: String,
    pub token_length: usize,
    pub account: Option<Account>,
    pub board: Option<BoardAccess>,
    pub webhook_count: Option<usize>,
    pub errors: Vec<String>,
}

/// Check that the token works and can see the board. Each probe is run
/// even when another fails; failures are collected, not returned.
pub async fn diagnose(state: &AppState) -> Result<Diagnostics, AdminError> {
    let token_length = state.config.token()?.len();
    let board_id = state.config.board_id()?;
    let client = state.client();
    let (account, board, webhooks) = futures::join!(
        client.current_account(),
        client.board_access(board_id),
        client.list_webhooks(board_id),
    );

    let mut errors = Vec::new();
    let account = account
        .map_err(|e| errors.push(format!("account: {}", e)))
        .ok();
    let board = board.map_err(|e| errors.push(format!("board: {}", e))).ok();
    let webhook_count = webhooks
        .map(|hooks| hooks.len())
        .map_err(|e| errors.push(format!("webhooks: {}", e)))
        .ok();

    Ok(Diagnostics {
        success: errors.is_empty(),
        board_id: board_id.to_string(),
        api_url: state.config.monday.api_url.clone(),
        api_version: state.config.monday.api_version.clone(),
        token_length,
        account,
        board,
        webhook_count,
        errors,
    })
}

fn status_columns(state: &AppState, columns: &[Column]) -> Vec<Column> {
    columns
        .iter()
        .filter(|c| c.is_status_like(&state.config.rules.status_title_hints))
        .cloned()
        .collect()
}
