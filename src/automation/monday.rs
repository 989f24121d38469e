//! monday.com GraphQL implementation of `BoardClient`.
//!
//! Every id travels as a GraphQL variable; nothing is spliced into query
//! text. Each call gets an explicit timeout and at most one retry, and only
//! for transport trouble (see `BoardError::is_transient`).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use super::board_client::BoardClient;
use super::models::{
    Account, BoardAccess, BoardItems, Column, Group, Item, Webhook, WebhookSubscription,
};
use crate::config::AutomationConfig;
use crate::errors::BoardError;

const ITEM_QUERY: &str =
    "query ($ids: [ID!]) { items (ids: $ids) { id name group { id title } } }";

const GROUPS_QUERY: &str = "query ($ids: [ID!]) { boards (ids: $ids) { groups { id title } } }";

const COLUMNS_QUERY: &str =
    "query ($ids: [ID!]) { boards (ids: $ids) { columns { id title type } } }";

const ITEMS_PAGE_QUERY: &str = "query ($ids: [ID!], $limit: Int) { boards (ids: $ids) { id name \
     items_page (limit: $limit) { items { id name group { id title } } } } }";

const WEBHOOKS_QUERY: &str =
    "query ($board: ID!) { webhooks (board_id: $board) { id event config } }";

const MOVE_MUTATION: &str = "mutation ($item: ID, $group: String!) { \
     move_item_to_group (item_id: $item, group_id: $group) { id } }";

const CREATE_WEBHOOK_MUTATION: &str = "mutation ($board: ID!, $url: String!, \
     $event: WebhookEventType!) { \
     create_webhook (board_id: $board, url: $url, event: $event) { id board_id } }";

const DELETE_WEBHOOK_MUTATION: &str = "mutation ($id: ID!) { delete_webhook (id: $id) { id } }";

const CHANGE_VALUES_MUTATION: &str = "mutation ($board: ID!, $item: ID, $values: JSON!) { \
     change_multiple_column_values (board_id: $board, item_id: $item, \
     column_values: $values) { id } }";

const CREATE_UPDATE_MUTATION: &str =
    "mutation ($item: ID!, $body: String!) { create_update (item_id: $item, body: $body) { id } }";

const ACCOUNT_QUERY: &str = "query { me { id name } }";

const BOARD_ACCESS_QUERY: &str =
    "query ($ids: [ID!]) { boards (ids: $ids) { id name permissions } }";

/// Longest slice of an unparseable body kept in an error message.
const MAX_BODY_IN_ERROR: usize = 512;

pub struct MondayClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    api_version: String,
    timeout: Duration,
    retries: u32,
}

impl MondayClient {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
        retries: u32,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("board-automator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            token: token.into(),
            api_version: api_version.into(),
            timeout,
            retries: retries.min(1),
        })
    }

    /// Build a client from resolved configuration. Fails without a token.
    pub fn from_config(config: &AutomationConfig) -> anyhow::Result<Self> {
        let token = config.token()?;
        Self::new(
            config.monday.api_url.clone(),
            token,
            config.monday.api_version.clone(),
            Duration::from_secs(config.monday.timeout_secs),
            config.retries(),
        )
    }

    /// Run a query, retrying once on transient failure.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T, BoardError> {
        let body = json!({ "query": query, "variables": variables });
        let mut attempt = 0u32;
        loop {
            match self.send_once(&body).await {
                Err(err) if err.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %err, "Retrying remote call");
                }
                Err(err) => {
                    tracing::debug!(operation, error = %err, "Remote call failed");
                    return Err(err);
                }
                Ok((status, text)) => return parse_response(status, &text),
            }
        }
    }

    /// One HTTP exchange. Only transport-level problems are errors here;
    /// the body is interpreted by `parse_response`.
    async fn send_once(&self, body: &Value) -> Result<(u16, String), BoardError> {
        let request = self
            .http
            .post(&self.api_url)
            .header("Authorization", &self.token)
            .header("API-Version", &self.api_version)
            .json(body);

        let exchange = async {
            let resp = request.send().await?;
            let status = resp.status().as_u16();
            let text = resp.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return Err(BoardError::Transport(e.to_string())),
            Err(_) => return Err(BoardError::Timeout { after: self.timeout }),
        };

        // Server-side trouble is classified before the payload so that a
        // retryable status is not masked by an error body.
        if status == 429 || status >= 500 {
            return Err(BoardError::Status {
                status,
                body: truncate(&text),
            });
        }
        Ok((status, text))
    }
}

#[derive(Deserialize)]
struct Envelope {
    data: Option<Value>,
    errors: Option<Vec<RemoteErrorEntry>>,
    error_message: Option<String>,
    error_code: Option<String>,
}

#[derive(Deserialize)]
struct RemoteErrorEntry {
    #[serde(default)]
    message: String,
}

/// Interpret a GraphQL response body.
///
/// The error array and top-level `error_message` are checked before `data`:
/// a 200 response carrying errors is a failure.
pub(crate) fn parse_response<T: DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<T, BoardError> {
    let success = (200..300).contains(&status);
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if success => return Err(BoardError::Decode(e.to_string())),
        Err(_) => {
            return Err(BoardError::Status {
                status,
                body: truncate(body),
            });
        }
    };

    if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
        return Err(BoardError::Remote {
            messages: errors
                .into_iter()
                .map(|e| {
                    if e.message.is_empty() {
                        "unknown error".to_string()
                    } else {
                        e.message
                    }
                })
                .collect(),
        });
    }
    if let Some(message) = envelope.error_message {
        let message = match envelope.error_code {
            Some(code) => format!("{} ({})", message, code),
            None => message,
        };
        return Err(BoardError::Remote {
            messages: vec![message],
        });
    }
    if !success {
        return Err(BoardError::Status {
            status,
            body: truncate(body),
        });
    }

    let data = envelope
        .data
        .filter(|d| !d.is_null())
        .ok_or_else(|| BoardError::MissingData("data".to_string()))?;
    serde_json::from_value(data).map_err(|e| BoardError::Decode(e.to_string()))
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_BODY_IN_ERROR {
        return body.to_string();
    }
    let mut end = MAX_BODY_IN_ERROR;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// monday.com ids arrive as strings in current API versions and as numbers
/// in older ones.
fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected id, got {}",
            other
        ))),
    }
}

// ── Response shapes ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct IdOnly {
    #[serde(deserialize_with = "de_id")]
    id: String,
}

#[derive(Deserialize)]
struct RawGroup {
    #[serde(deserialize_with = "de_id")]
    id: String,
    title: String,
}

impl From<RawGroup> for Group {
    fn from(raw: RawGroup) -> Self {
        Group::new(raw.id, raw.title)
    }
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(deserialize_with = "de_id")]
    id: String,
    name: String,
    group: Option<RawGroup>,
}

impl RawItem {
    fn into_item(self) -> Result<Item, BoardError> {
        let group = self
            .group
            .ok_or_else(|| BoardError::MissingData(format!("group of item {}", self.id)))?;
        Ok(Item {
            id: self.id,
            name: self.name,
            group: group.into(),
        })
    }
}

#[derive(Deserialize)]
struct ItemsData {
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Deserialize)]
struct BoardsData<B> {
    #[serde(default = "Vec::new")]
    boards: Vec<B>,
}

impl<B> BoardsData<B> {
    fn first(self, board_id: &str) -> Result<B, BoardError> {
        self.boards
            .into_iter()
            .next()
            .ok_or_else(|| BoardError::MissingData(format!("board {}", board_id)))
    }
}

#[derive(Deserialize)]
struct GroupsBoard {
    #[serde(default)]
    groups: Vec<RawGroup>,
}

#[derive(Deserialize)]
struct ColumnsBoard {
    #[serde(default)]
    columns: Vec<Column>,
}

#[derive(Deserialize)]
struct ItemsPage {
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Deserialize)]
struct ItemsBoard {
    #[serde(deserialize_with = "de_id")]
    id: String,
    name: String,
    items_page: ItemsPage,
}

#[derive(Deserialize)]
struct RawWebhook {
    #[serde(deserialize_with = "de_id")]
    id: String,
    event: String,
    config: Option<Value>,
}

#[derive(Deserialize)]
struct WebhooksData {
    #[serde(default)]
    webhooks: Vec<RawWebhook>,
}

#[derive(Deserialize)]
struct RawSubscription {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(deserialize_with = "de_id")]
    board_id: String,
}

#[derive(Deserialize)]
struct MoveData {
    move_item_to_group: Option<IdOnly>,
}

#[derive(Deserialize)]
struct CreateWebhookData {
    create_webhook: Option<RawSubscription>,
}

#[derive(Deserialize)]
struct DeleteWebhookData {
    delete_webhook: Option<IdOnly>,
}

#[derive(Deserialize)]
struct ChangeValuesData {
    change_multiple_column_values: Option<IdOnly>,
}

#[derive(Deserialize)]
struct CreateUpdateData {
    create_update: Option<IdOnly>,
}

#[derive(Deserialize)]
struct RawAccount {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct AccountData {
    me: Option<RawAccount>,
}

#[derive(Deserialize)]
struct AccessBoard {
    #[serde(deserialize_with = "de_id")]
    id: String,
    name: String,
    #[serde(default)]
    permissions: Option<String>,
}

#[async_trait]
impl BoardClient for MondayClient {
    async fn get_item(&self, item_id: &str) -> Result<Option<Item>, BoardError> {
        let data: ItemsData = self
            .execute("get_item", ITEM_QUERY, json!({ "ids": [item_id] }))
            .await?;
        data.items
            .into_iter()
            .next()
            .map(RawItem::into_item)
            .transpose()
    }

    async fn get_groups(&self, board_id: &str) -> Result<Vec<Group>, BoardError> {
        let data: BoardsData<GroupsBoard> = self
            .execute("get_groups", GROUPS_QUERY, json!({ "ids": [board_id] }))
            .await?;
        Ok(data
            .first(board_id)?
            .groups
            .into_iter()
            .map(Group::from)
            .collect())
    }

    async fn move_item_to_group(
        &self,
        item_id: &str,
        group_id: &str,
    ) -> Result<String, BoardError> {
        let data: MoveData = self
            .execute(
                "move_item_to_group",
                MOVE_MUTATION,
                json!({ "item": item_id, "group": group_id }),
            )
            .await?;
        data.move_item_to_group
            .map(|moved| moved.id)
            .ok_or_else(|| BoardError::MissingData("move_item_to_group".to_string()))
    }

    async fn get_columns(&self, board_id: &str) -> Result<Vec<Column>, BoardError> {
        let data: BoardsData<ColumnsBoard> = self
            .execute("get_columns", COLUMNS_QUERY, json!({ "ids": [board_id] }))
            .await?;
        Ok(data.first(board_id)?.columns)
    }

    async fn list_items(&self, board_id: &str, limit: u32) -> Result<BoardItems, BoardError> {
        let data: BoardsData<ItemsBoard> = self
            .execute(
                "list_items",
                ITEMS_PAGE_QUERY,
                json!({ "ids": [board_id], "limit": limit }),
            )
            .await?;
        let board = data.first(board_id)?;
        let items = board
            .items_page
            .items
            .into_iter()
            .map(RawItem::into_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BoardItems {
            id: board.id,
            name: board.name,
            items,
        })
    }

    async fn list_webhooks(&self, board_id: &str) -> Result<Vec<Webhook>, BoardError> {
        let data: WebhooksData = self
            .execute("list_webhooks", WEBHOOKS_QUERY, json!({ "board": board_id }))
            .await?;
        Ok(data
            .webhooks
            .into_iter()
            .map(|raw| Webhook {
                id: raw.id,
                event: raw.event,
                config: raw.config.filter(|c| !c.is_null()).map(|c| match c {
                    Value::String(s) => s,
                    other => other.to_string(),
                }),
            })
            .collect())
    }

    async fn create_webhook(
        &self,
        board_id: &str,
        callback_url: &str,
        event: &str,
    ) -> Result<WebhookSubscription, BoardError> {
        let data: CreateWebhookData = self
            .execute(
                "create_webhook",
                CREATE_WEBHOOK_MUTATION,
                json!({ "board": board_id, "url": callback_url, "event": event }),
            )
            .await?;
        data.create_webhook
            .map(|raw| WebhookSubscription {
                id: raw.id,
                board_id: raw.board_id,
            })
            .ok_or_else(|| BoardError::MissingData("create_webhook".to_string()))
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<String, BoardError> {
        let data: DeleteWebhookData = self
            .execute(
                "delete_webhook",
                DELETE_WEBHOOK_MUTATION,
                json!({ "id": webhook_id }),
            )
            .await?;
        data.delete_webhook
            .map(|deleted| deleted.id)
            .ok_or_else(|| BoardError::MissingData("delete_webhook".to_string()))
    }

    async fn change_column_values(
        &self,
        board_id: &str,
        item_id: &str,
        values: Value,
    ) -> Result<String, BoardError> {
        // The JSON scalar expects the column map encoded as a string.
        let data: ChangeValuesData = self
            .execute(
                "change_column_values",
                CHANGE_VALUES_MUTATION,
                json!({ "board": board_id, "item": item_id, "values": values.to_string() }),
            )
            .await?;
        data.change_multiple_column_values
            .map(|changed| changed.id)
            .ok_or_else(|| BoardError::MissingData("change_multiple_column_values".to_string()))
    }

    async fn create_update(&self, item_id: &str, body: &str) -> Result<String, BoardError> {
        let data: CreateUpdateData = self
            .execute(
                "create_update",
                CREATE_UPDATE_MUTATION,
                json!({ "item": item_id, "body": body }),
            )
            .await?;
        data.create_update
            .map(|update| update.id)
            .ok_or_else(|| BoardError::MissingData("create_update".to_string()))
    }

    async fn current_account(&self) -> Result<Account, BoardError> {
        let data: AccountData = self
            .execute("current_account", ACCOUNT_QUERY, json!({}))
            .await?;
        data.me
            .map(|me| Account {
                id: me.id,
                name: me.name,
            })
            .ok_or_else(|| BoardError::MissingData("me".to_string()))
    }

    async fn board_access(&self, board_id: &str) -> Result<BoardAccess, BoardError> {
        let data: BoardsData<AccessBoard> = self
            .execute(
                "board_access",
                BOARD_ACCESS_QUERY,
                json!({ "ids": [board_id] }),
            )
            .await?;
        let board = data.first(board_id)?;
        Ok(BoardAccess {
            id: board.id,
            name: board.name,
            permissions: board.permissions.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
