//! Decides whether a column change means "work finished".
//!
//! Rules, first match wins:
//! 1. Checkbox column whose `checked` flag is `true` or `"true"`.
//! 2. Status-like column (type `color`/`status`, or a title matching a
//!    status hint) whose label contains a done keyword, or failing that,
//!    whose index is in the done-index set.
//! 3. Nothing else is a completion signal.
//!
//! Columns that are neither checkboxes nor status-like are ignored whatever
//! their content, so a text column reading "done" never moves an item.

use serde_json::Value;

use super::models::{
    ClassificationResult, ColumnChangeEvent, ColumnType, MatchedRule, title_matches,
};
use crate::config::RulesConfig;

#[derive(Debug, Clone)]
pub struct StatusClassifier {
    done_keywords: Vec<String>,
    done_indices: Vec<i64>,
    status_title_hints: Vec<String>,
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new(&RulesConfig::default())
    }
}

impl StatusClassifier {
    pub fn new(rules: &RulesConfig) -> Self {
        Self {
            done_keywords: rules
                .done_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            done_indices: rules.done_indices.clone(),
            status_title_hints: rules.status_title_hints.clone(),
        }
    }

    /// Pure and total: never performs I/O and never fails.
    pub fn classify(&self, event: &ColumnChangeEvent) -> ClassificationResult {
        let value = match event.raw_value.as_ref() {
            Some(v) if !v.is_null() => v,
            _ => return ClassificationResult::no_signal("Column value was empty"),
        };

        if event.column_type == ColumnType::Checkbox {
            return if is_checked(value) {
                ClassificationResult {
                    is_completion_signal: true,
                    matched_rule: MatchedRule::CheckboxChecked,
                    normalized_label: None,
                    normalized_index: None,
                    reason: "Checkbox was checked".to_string(),
                }
            } else {
                ClassificationResult::no_signal("Checkbox was unchecked")
            };
        }

        if !self.is_status_like(event) {
            return ClassificationResult::no_signal(format!(
                "Column change recorded: {}",
                event.column_type.as_str()
            ));
        }

        let label = extract_label(value);
        let index = extract_index(value);

        if let Some(label) = label.as_deref()
            && self.done_keywords.iter().any(|k| label.contains(k.as_str()))
        {
            return ClassificationResult {
                is_completion_signal: true,
                matched_rule: MatchedRule::LabelKeyword,
                normalized_label: Some(label.to_string()),
                normalized_index: index,
                reason: format!(
                    "Status column \"{}\" changed to \"{}\"",
                    event.column_id, label
                ),
            };
        }

        if let Some(idx) = index
            && self.done_indices.contains(&idx)
        {
            return ClassificationResult {
                is_completion_signal: true,
                matched_rule: MatchedRule::IndexMatch,
                normalized_label: label,
                normalized_index: Some(idx),
                reason: format!(
                    "Status column \"{}\" changed to done index {}",
                    event.column_id, idx
                ),
            };
        }

        ClassificationResult {
            is_completion_signal: false,
            matched_rule: MatchedRule::None,
            reason: format!(
                "Status changed but not to a done value: \"{}\" (index: {})",
                label.as_deref().unwrap_or(""),
                index.map(|i| i.to_string()).unwrap_or_else(|| "none".into())
            ),
            normalized_label: label,
            normalized_index: index,
        }
    }

    fn is_status_like(&self, event: &ColumnChangeEvent) -> bool {
        event.column_type.is_status()
            || event
                .column_title
                .as_deref()
                .is_some_and(|title| title_matches(title, &self.status_title_hints))
    }
}

fn is_checked(value: &Value) -> bool {
    match value.get("checked") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim() == "true",
        _ => false,
    }
}

/// The label is either a plain string or, as monday.com sends it, an object
/// with a `text` field.
fn extract_label(value: &Value) -> Option<String> {
    let raw = match value.get("label")? {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("text")?.as_str()?,
        _ => return None,
    };
    let normalized = raw.trim().to_lowercase();
    (!normalized.is_empty()).then_some(normalized)
}

/// Index from `value.index`, falling back to `value.label.index`.
fn extract_index(value: &Value) -> Option<i64> {
    value
        .get("index")
        .and_then(as_integer)
        .or_else(|| value.get("label")?.get("index").and_then(as_integer))
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
