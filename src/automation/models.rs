use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A board group, e.g. "Working on it" or "Done".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub title: String,
}

impl Group {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// An item together with the group it currently sits in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub group: Group,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl Column {
    /// Status-like by type, or by a title hint such as "status".
    pub fn is_status_like(&self, title_hints: &[String]) -> bool {
        ColumnType::from_str(&self.column_type)
            .map(|t| t.is_status())
            .unwrap_or(false)
            || title_matches(&self.title, title_hints)
    }

    pub fn is_link(&self) -> bool {
        self.column_type == "link"
    }
}

/// Case-insensitive substring match of a column title against hints.
pub fn title_matches(title: &str, hints: &[String]) -> bool {
    let title = title.to_lowercase();
    hints
        .iter()
        .any(|hint| !hint.is_empty() && title.contains(&hint.to_lowercase()))
}

/// A board with a page of its items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardItems {
    pub id: String,
    pub name: String,
    pub items: Vec<Item>,
}

/// An existing webhook subscription on a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Webhook {
    pub id: String,
    pub event: String,
    pub config: Option<String>,
}

/// Result of registering a webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookSubscription {
    pub id: String,
    pub board_id: String,
}

/// The user the API token belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
}

/// A board as seen by the token, with the permission level it grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardAccess {
    pub id: String,
    pub name: String,
    pub permissions: String,
}

/// Column kinds the classifier distinguishes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Color,
    Status,
    Checkbox,
    Other,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Status => "status",
            Self::Checkbox => "checkbox",
            Self::Other => "other",
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Self::Color | Self::Status)
    }

    /// Map the platform's column type string. Never fails; anything
    /// unrecognised is `Other`.
    pub fn from_wire(s: &str) -> Self {
        Self::from_str(s).unwrap_or(Self::Other)
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "color" => Ok(Self::Color),
            "status" => Ok(Self::Status),
            "checkbox" | "boolean" => Ok(Self::Checkbox),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown column type: {}", s)),
        }
    }
}

/// A column value changed on an item. Built from a webhook payload and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChangeEvent {
    pub item_id: String,
    pub item_name: String,
    pub board_id: Option<String>,
    pub column_id: String,
    pub column_title: Option<String>,
    pub column_type: ColumnType,
    pub raw_value: Option<serde_json::Value>,
    pub previous_value: Option<serde_json::Value>,
}

/// Which classifier rule fired.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MatchedRule {
    CheckboxChecked,
    LabelKeyword,
    IndexMatch,
    /// Completion requested explicitly, e.g. through an action link.
    Manual,
    None,
}

impl MatchedRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckboxChecked => "checkbox-checked",
            Self::LabelKeyword => "label-keyword",
            Self::IndexMatch => "index-match",
            Self::Manual => "manual",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationResult {
    pub is_completion_signal: bool,
    pub matched_rule: MatchedRule,
    pub normalized_label: Option<String>,
    pub normalized_index: Option<i64>,
    /// Human-readable explanation, echoed back in webhook responses.
    pub reason: String,
}

impl ClassificationResult {
    pub fn no_signal(reason: impl Into<String>) -> Self {
        Self {
            is_completion_signal: false,
            matched_rule: MatchedRule::None,
            normalized_label: None,
            normalized_index: None,
            reason: reason.into(),
        }
    }

    pub fn manual(reason: impl Into<String>) -> Self {
        Self {
            is_completion_signal: true,
            matched_rule: MatchedRule::Manual,
            normalized_label: None,
            normalized_index: None,
            reason: reason.into(),
        }
    }
}

/// Terminal state of one reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    /// Not a completion signal; nothing was attempted.
    #[serde(rename = "change_logged")]
    NoActionNeeded,
    AlreadyInTarget,
    MovedAndVerified,
    MovedButUnverified,
    NoTargetGroup,
    RemoteError,
}

impl MoveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoActionNeeded => "change_logged",
            Self::AlreadyInTarget => "already_in_target",
            Self::MovedAndVerified => "moved_and_verified",
            Self::MovedButUnverified => "moved_but_unverified",
            Self::NoTargetGroup => "no_target_group",
            Self::RemoteError => "remote_error",
        }
    }

    /// Whether the automation behaved as intended. A missing Done group is
    /// informational, not a failure.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::MovedButUnverified | Self::RemoteError)
    }
}

impl std::fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub status: MoveStatus,
    pub from_group: Option<String>,
    pub to_group: Option<String>,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub available_groups: Vec<String>,
}

impl MoveOutcome {
    pub fn new(status: MoveStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            from_group: None,
            to_group: None,
            detail: detail.into(),
            available_groups: Vec::new(),
        }
    }

    pub fn no_action(detail: impl Into<String>) -> Self {
        Self::new(MoveStatus::NoActionNeeded, detail)
    }

    pub fn remote_error(detail: impl Into<String>) -> Self {
        Self::new(MoveStatus::RemoteError, detail)
    }

    pub fn with_groups(mut self, from: Option<&Group>, to: Option<&Group>) -> Self {
        self.from_group = from.map(|g| g.title.clone());
        self.to_group = to.map(|g| g.title.clone());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_from_wire() {
        assert_eq!(ColumnType::from_wire("color"), ColumnType::Color);
        assert_eq!(ColumnType::from_wire("STATUS"), ColumnType::Status);
        assert_eq!(ColumnType::from_wire("checkbox"), ColumnType::Checkbox);
        assert_eq!(ColumnType::from_wire("boolean"), ColumnType::Checkbox);
        assert_eq!(ColumnType::from_wire("long-text"), ColumnType::Other);
        assert_eq!(ColumnType::from_wire(""), ColumnType::Other);
    }

    #[test]
    fn test_column_is_status_like() {
        let hints = vec!["status".to_string()];
        let by_type = Column {
            id: "color_1".into(),
            title: "Stage".into(),
            column_type: "color".into(),
        };
        let by_title = Column {
            id: "text_1".into(),
            title: "Review Status".into(),
            column_type: "text".into(),
        };
        let neither = Column {
            id: "text_2".into(),
            title: "Notes".into(),
            column_type: "text".into(),
        };
        assert!(by_type.is_status_like(&hints));
        assert!(by_title.is_status_like(&hints));
        assert!(!neither.is_status_like(&hints));
    }

    #[test]
    fn test_move_status_serializes_as_action_names() {
        assert_eq!(
            serde_json::to_value(MoveStatus::NoActionNeeded).unwrap(),
            "change_logged"
        );
        assert_eq!(
            serde_json::to_value(MoveStatus::MovedAndVerified).unwrap(),
            "moved_and_verified"
        );
        for status in [
            MoveStatus::NoActionNeeded,
            MoveStatus::AlreadyInTarget,
            MoveStatus::MovedAndVerified,
            MoveStatus::MovedButUnverified,
            MoveStatus::NoTargetGroup,
            MoveStatus::RemoteError,
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), status.as_str());
        }
    }

    #[test]
    fn test_move_status_success_split() {
        assert!(MoveStatus::AlreadyInTarget.is_success());
        assert!(MoveStatus::NoTargetGroup.is_success());
        assert!(MoveStatus::NoActionNeeded.is_success());
        assert!(!MoveStatus::MovedButUnverified.is_success());
        assert!(!MoveStatus::RemoteError.is_success());
    }

    #[test]
    fn test_matched_rule_kebab_case() {
        assert_eq!(
            serde_json::to_value(MatchedRule::CheckboxChecked).unwrap(),
            "checkbox-checked"
        );
        assert_eq!(MatchedRule::IndexMatch.as_str(), "index-match");
    }

    #[test]
    fn test_move_outcome_with_groups() {
        let from = Group::new("w", "Working on it");
        let to = Group::new("d", "Done");
        let outcome = MoveOutcome::new(MoveStatus::MovedAndVerified, "moved")
            .with_groups(Some(&from), Some(&to));
        assert_eq!(outcome.from_group.as_deref(), Some("Working on it"));
        assert_eq!(outcome.to_group.as_deref(), Some("Done"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["fromGroup"], "Working on it");
        assert!(json.get("availableGroups").is_none());
    }
}
