//! In-memory `BoardClient` used by unit and integration tests.
//!
//! Records every call as `"<operation>:<args>"` and lets a test script
//! remote failures or a move that is acknowledged but never applied.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use super::board_client::BoardClient;
use super::models::{
    Account, BoardAccess, BoardItems, Column, Group, Item, Webhook, WebhookSubscription,
};
use crate::errors::BoardError;

/// Lock that survives a panic raised by an earlier scripted call.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ScriptedFailure {
    /// Successful calls to allow before failing.
    after: usize,
    message: String,
}

#[derive(Default)]
pub struct FakeBoardClient {
    boards: Mutex<HashMap<String, (String, Vec<Group>)>>,
    columns: Mutex<HashMap<String, Vec<Column>>>,
    items: Mutex<HashMap<String, Item>>,
    webhooks: Mutex<HashMap<String, Vec<Webhook>>>,
    column_values: Mutex<HashMap<String, serde_json::Value>>,
    updates: Mutex<HashMap<String, Vec<String>>>,
    failures: Mutex<HashMap<String, ScriptedFailure>>,
    calls: Mutex<Vec<String>>,
    ignore_moves: AtomicBool,
    panic_on_get_item: AtomicBool,
    next_id: AtomicU64,
}

impl FakeBoardClient {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    pub fn add_board(&self, board_id: &str, groups: Vec<Group>) {
        lock(&self.boards).insert(
            board_id.to_string(),
            (format!("Board {}", board_id), groups),
        );
    }

    pub fn add_columns(&self, board_id: &str, columns: Vec<Column>) {
        lock(&self.columns).insert(board_id.to_string(), columns);
    }

    pub fn add_item(&self, item_id: &str, name: &str, group: Group) {
        lock(&self.items).insert(
            item_id.to_string(),
            Item {
                id: item_id.to_string(),
                name: name.to_string(),
                group,
            },
        );
    }

    pub fn add_webhook(&self, board_id: &str, webhook: Webhook) {
        lock(&self.webhooks)
            .entry(board_id.to_string())
            .or_default()
            .push(webhook);
    }

    /// Every call to `operation` fails with a remote error.
    pub fn fail(&self, operation: &str, message: &str) {
        self.fail_after(operation, 0, message);
    }

    /// The first `after` calls to `operation` succeed, later ones fail.
    pub fn fail_after(&self, operation: &str, after: usize, message: &str) {
        lock(&self.failures).insert(
            operation.to_string(),
            ScriptedFailure {
                after,
                message: message.to_string(),
            },
        );
    }

    /// Acknowledge moves without applying them.
    pub fn set_ignore_moves(&self, ignore: bool) {
        self.ignore_moves.store(ignore, Ordering::SeqCst);
    }

    pub fn set_panic_on_get_item(&self, panic: bool) {
        self.panic_on_get_item.store(panic, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of calls made to `operation`.
    pub fn count(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        lock(&self.calls)
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    /// Id of the group the item is in right now.
    pub fn group_of(&self, item_id: &str) -> Option<String> {
        lock(&self.items)
            .get(item_id)
            .map(|item| item.group.id.clone())
    }

    pub fn column_value(&self, item_id: &str) -> Option<serde_json::Value> {
        lock(&self.column_values).get(item_id).cloned()
    }

    /// Update bodies posted on an item, oldest first.
    pub fn updates(&self, item_id: &str) -> Vec<String> {
        lock(&self.updates)
            .get(item_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn webhook_ids(&self, board_id: &str) -> Vec<String> {
        lock(&self.webhooks)
            .get(board_id)
            .map(|hooks| hooks.iter().map(|h| h.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Record the call, then apply any scripted failure for it.
    fn record(&self, operation: &str, args: &[&str]) -> Result<(), BoardError> {
        let seen = self.count(operation);
        let entry = format!("{}:{}", operation, args.join(":"));
        lock(&self.calls).push(entry);

        match lock(&self.failures).get(operation) {
            Some(failure) if seen >= failure.after => Err(BoardError::Remote {
                messages: vec![failure.message.clone()],
            }),
            _ => Ok(()),
        }
    }

    fn missing_board(board_id: &str) -> BoardError {
        BoardError::MissingData(format!("board {}", board_id))
    }
}

#[async_trait]
impl BoardClient for FakeBoardClient {
    async fn get_item(&self, item_id: &str) -> Result<Option<Item>, BoardError> {
        self.record("get_item", &[item_id])?;
        if self.panic_on_get_item.load(Ordering::SeqCst) {
            panic!("scripted panic in get_item");
        }
        Ok(lock(&self.items).get(item_id).cloned())
    }

    async fn get_groups(&self, board_id: &str) -> Result<Vec<Group>, BoardError> {
        self.record("get_groups", &[board_id])?;
        lock(&self.boards)
            .get(board_id)
            .map(|(_, groups)| groups.clone())
            .ok_or_else(|| Self::missing_board(board_id))
    }

    async fn move_item_to_group(
        &self,
        item_id: &str,
        group_id: &str,
    ) -> Result<String, BoardError> {
        self.record("move_item_to_group", &[item_id, group_id])?;
        let group = lock(&self.boards)
            .values()
            .flat_map(|(_, groups)| groups.iter())
            .find(|g| g.id == group_id)
            .cloned()
            .ok_or_else(|| BoardError::Remote {
                messages: vec![format!("Group {} not found", group_id)],
            })?;
        let mut items = lock(&self.items);
        let item = items.get_mut(item_id).ok_or_else(|| BoardError::Remote {
            messages: vec![format!("Item {} not found", item_id)],
        })?;
        if !self.ignore_moves.load(Ordering::SeqCst) {
            item.group = group;
        }
        Ok(item_id.to_string())
    }

    async fn get_columns(&self, board_id: &str) -> Result<Vec<Column>, BoardError> {
        self.record("get_columns", &[board_id])?;
        if !lock(&self.boards).contains_key(board_id) {
            return Err(Self::missing_board(board_id));
        }
        Ok(lock(&self.columns)
            .get(board_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_items(&self, board_id: &str, limit: u32) -> Result<BoardItems, BoardError> {
        self.record("list_items", &[board_id])?;
        let (name, group_ids) = {
            let boards = lock(&self.boards);
            let (name, groups) = boards
                .get(board_id)
                .ok_or_else(|| Self::missing_board(board_id))?;
            let ids: Vec<String> = groups.iter().map(|g| g.id.clone()).collect();
            (name.clone(), ids)
        };
        let mut items: Vec<Item> = lock(&self.items)
            .values()
            .filter(|item| group_ids.contains(&item.group.id))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items.truncate(limit as usize);
        Ok(BoardItems {
            id: board_id.to_string(),
            name,
            items,
        })
    }

    async fn list_webhooks(&self, board_id: &str) -> Result<Vec<Webhook>, BoardError> {
        self.record("list_webhooks", &[board_id])?;
        Ok(lock(&self.webhooks)
            .get(board_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_webhook(
        &self,
        board_id: &str,
        callback_url: &str,
        event: &str,
    ) -> Result<WebhookSubscription, BoardError> {
        self.record("create_webhook", &[board_id, callback_url, event])?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.add_webhook(
            board_id,
            Webhook {
                id: id.clone(),
                event: event.to_string(),
                config: Some(callback_url.to_string()),
            },
        );
        Ok(WebhookSubscription {
            id,
            board_id: board_id.to_string(),
        })
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<String, BoardError> {
        self.record("delete_webhook", &[webhook_id])?;
        let mut webhooks = lock(&self.webhooks);
        for hooks in webhooks.values_mut() {
            if let Some(pos) = hooks.iter().position(|h| h.id == webhook_id) {
                hooks.remove(pos);
                return Ok(webhook_id.to_string());
            }
        }
        Err(BoardError::Remote {
            messages: vec![format!("Webhook {} not found", webhook_id)],
        })
    }

    async fn change_column_values(
        &self,
        board_id: &str,
        item_id: &str,
        values: serde_json::Value,
    ) -> Result<String, BoardError> {
        self.record("change_column_values", &[board_id, item_id])?;
        if !lock(&self.items).contains_key(item_id) {
            return Err(BoardError::Remote {
                messages: vec![format!("Item {} not found", item_id)],
            });
        }
        lock(&self.column_values).insert(item_id.to_string(), values);
        Ok(item_id.to_string())
    }

    async fn create_update(&self, item_id: &str, body: &str) -> Result<String, BoardError> {
        self.record("create_update", &[item_id])?;
        if !lock(&self.items).contains_key(item_id) {
            return Err(BoardError::Remote {
                messages: vec![format!("Item {} not found", item_id)],
            });
        }
        lock(&self.updates)
            .entry(item_id.to_string())
            .or_default()
            .push(body.to_string());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    async fn current_account(&self) -> Result<Account, BoardError> {
        self.record("current_account", &[])?;
        Ok(Account {
            id: "1".to_string(),
            name: "Test User".to_string(),
        })
    }

    async fn board_access(&self, board_id: &str) -> Result<BoardAccess, BoardError> {
        self.record("board_access", &[board_id])?;
        let boards = lock(&self.boards);
        let (name, _) = boards
            .get(board_id)
            .ok_or_else(|| Self::missing_board(board_id))?;
        Ok(BoardAccess {
            id: board_id.to_string(),
            name: name.clone(),
            permissions: "everyone".to_string(),
        })
    }
}
