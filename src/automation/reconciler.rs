//! "Ensure this item is in the Done group", performed against a remote API
//! that offers no transactions and only eventual consistency.
//!
//! ## Steps
//!
//! 1. No completion signal → `change_logged`, zero remote calls.
//! 2. Read the item (and its group). Missing or failed → `remote_error`.
//! 3. Read the board's groups. Failed → `remote_error`.
//! 4. Resolve the target group. None → `no_target_group` naming the groups.
//! 5. Already there → `already_in_target`, no mutation.
//! 6. Move. Failed → `remote_error` with the remote's message.
//! 7. Read the item again. In target → `moved_and_verified`; anything else,
//!    including a failed read → `moved_but_unverified`.
//!
//! State is re-read on every call; nothing is cached between or within
//! reconciliations. Two concurrent calls for the same item can both reach
//! step 6; the remote move is idempotent so that costs one extra request.

use std::sync::Arc;

use super::board_client::BoardClient;
use super::models::{ClassificationResult, MoveOutcome, MoveStatus};
use super::resolver::GroupResolver;

pub struct Reconciler {
    client: Arc<dyn BoardClient>,
    resolver: GroupResolver,
}

impl Reconciler {
    pub fn new(client: Arc<dyn BoardClient>, resolver: GroupResolver) -> Self {
        Self { client, resolver }
    }

    pub fn client(&self) -> &Arc<dyn BoardClient> {
        &self.client
    }

    pub fn resolver(&self) -> &GroupResolver {
        &self.resolver
    }

    #[tracing::instrument(
        name = "reconcile",
        skip(self, classification),
        fields(rule = classification.matched_rule.as_str())
    )]
    pub async fn reconcile(
        &self,
        item_id: &str,
        board_id: &str,
        classification: &ClassificationResult,
    ) -> MoveOutcome {
        if !classification.is_completion_signal {
            tracing::debug!(reason = %classification.reason, "No completion signal");
            return MoveOutcome::no_action(classification.reason.clone());
        }

        let item = match self.client.get_item(item_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                tracing::warn!("Item not found");
                return MoveOutcome::remote_error("item not found");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch item");
                return MoveOutcome::remote_error(format!("Failed to fetch item: {}", e));
            }
        };
        tracing::debug!(group = %item.group.title, "Current item location");

        let groups = match self.client.get_groups(board_id).await {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch board groups");
                return MoveOutcome::remote_error(format!("Failed to fetch board groups: {}", e))
                    .with_groups(Some(&item.group), None);
            }
        };

        let Some(target) = self.resolver.resolve(&groups) else {
            let titles: Vec<String> = groups.iter().map(|g| g.title.clone()).collect();
            tracing::info!(groups = ?titles, "No Done-like group on board");
            let mut outcome = MoveOutcome::new(
                MoveStatus::NoTargetGroup,
                format!(
                    "No Done-like group found; available groups: {}",
                    titles.join(", ")
                ),
            )
            .with_groups(Some(&item.group), None);
            outcome.available_groups = titles;
            return outcome;
        };

        if item.group.id == target.id {
            tracing::info!(group = %target.title, "Item already in target group");
            return MoveOutcome::new(
                MoveStatus::AlreadyInTarget,
                format!("Item already in \"{}\"", target.title),
            )
            .with_groups(Some(&item.group), Some(target));
        }

        tracing::info!(from = %item.group.title, to = %target.title, "Moving item");
        if let Err(e) = self.client.move_item_to_group(item_id, &target.id).await {
            tracing::error!(error = %e, "Move mutation failed");
            return MoveOutcome::remote_error(format!("Failed to move item: {}", e))
                .with_groups(Some(&item.group), Some(target));
        }

        match self.client.get_item(item_id).await {
            Ok(Some(moved)) if moved.group.id == target.id => {
                tracing::info!(group = %moved.group.title, "Move verified");
                MoveOutcome::new(
                    MoveStatus::MovedAndVerified,
                    format!("Moved from \"{}\" to \"{}\"", item.group.title, target.title),
                )
                .with_groups(Some(&item.group), Some(target))
            }
            Ok(Some(moved)) => {
                tracing::warn!(
                    expected = %target.id,
                    actual = %moved.group.id,
                    "Move acknowledged but item is elsewhere"
                );
                MoveOutcome::new(
                    MoveStatus::MovedButUnverified,
                    format!(
                        "Move acknowledged but item is in \"{}\", expected \"{}\"",
                        moved.group.title, target.title
                    ),
                )
                .with_groups(Some(&item.group), Some(target))
            }
            Ok(None) => {
                tracing::warn!("Item vanished after move");
                MoveOutcome::new(
                    MoveStatus::MovedButUnverified,
                    "Move acknowledged but item could not be re-read",
                )
                .with_groups(Some(&item.group), Some(target))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Verification read failed");
                MoveOutcome::new(
                    MoveStatus::MovedButUnverified,
                    format!("Move acknowledged but verification failed: {}", e),
                )
                .with_groups(Some(&item.group), Some(target))
            }
        }
    }
}
