use async_trait::async_trait;

use super::models::{
    Account, BoardAccess, BoardItems, Column, Group, Item, Webhook, WebhookSubscription,
};
use crate::errors::BoardError;

/// Event name the automation subscribes to.
pub const CHANGE_COLUMN_VALUE_EVENT: &str = "change_column_value";

/// Abstraction over the remote board API for testability.
/// Real implementation: `MondayClient`. Test double: `FakeBoardClient`.
///
/// Implementations carry no business logic and hold no cached board state.
/// An HTTP success that carries an error payload must surface as `Err`.
#[async_trait]
pub trait BoardClient: Send + Sync {
    /// Fetch an item with its current group. `Ok(None)` when the item does
    /// not exist or is not visible to the token.
    async fn get_item(&self, item_id: &str) -> Result<Option<Item>, BoardError>;

    /// Groups of a board in the order the platform returns them.
    async fn get_groups(&self, board_id: &str) -> Result<Vec<Group>, BoardError>;

    /// Move an item into a group. Returns the moved item's id.
    async fn move_item_to_group(&self, item_id: &str, group_id: &str)
    -> Result<String, BoardError>;

    async fn get_columns(&self, board_id: &str) -> Result<Vec<Column>, BoardError>;

    /// First page of a board's items, up to `limit`.
    async fn list_items(&self, board_id: &str, limit: u32) -> Result<BoardItems, BoardError>;

    async fn list_webhooks(&self, board_id: &str) -> Result<Vec<Webhook>, BoardError>;

    async fn create_webhook(
        &self,
        board_id: &str,
        callback_url: &str,
        event: &str,
    ) -> Result<WebhookSubscription, BoardError>;

    /// Delete a webhook subscription. Returns the deleted id.
    async fn delete_webhook(&self, webhook_id: &str) -> Result<String, BoardError>;

    /// Write several column values on one item. `values` maps column id to
    /// the column's JSON value. Returns the item id.
    async fn change_column_values(
        &self,
        board_id: &str,
        item_id: &str,
        values: serde_json::Value,
    ) -> Result<String, BoardError>;

    /// Post an update (comment) on an item. Returns the update id.
    async fn create_update(&self, item_id: &str, body: &str) -> Result<String, BoardError>;

    /// The account behind the API token.
    async fn current_account(&self) -> Result<Account, BoardError>;

    async fn board_access(&self, board_id: &str) -> Result<BoardAccess, BoardError>;
}
