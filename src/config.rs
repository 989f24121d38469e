//! Layered configuration for the board automator.
//!
//! Settings are read from `board-automator.toml` (or the file passed with
//! `--config`), then overridden by environment variables, then by CLI flags.
//! The API token is only ever taken from the environment.
//!
//! # Configuration File Format
//!
//! ```toml
//! [monday]
//! api_url = "https://api.monday.com/v2"
//! api_version = "2024-10"
//! board_id = "1234567890"
//! timeout_secs = 10
//! max_retries = 1
//!
//! [rules]
//! done_keywords = ["done", "complete", "completed", "finished", "closed"]
//! done_indices = [1, 4, 40]
//! status_title_hints = ["status"]
//! group_keywords = ["done", "complete", "finished"]
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! public_url = "https://automator.example.com"
//! log_json = false
//!
//! [links]
//! max_items = 5
//! text = "Take Action"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "board-automator.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub monday: MondayConfig,
    pub rules: RulesConfig,
    pub server: ServerSettings,
    pub links: LinksConfig,
}

/// Remote API connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MondayConfig {
    pub api_url: String,
    pub api_version: String,
    pub board_id: Option<String>,
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure. Values above 1 are clamped.
    pub max_retries: u32,
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for MondayConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.monday.com/v2".to_string(),
            api_version: "2024-10".to_string(),
            board_id: None,
            timeout_secs: 10,
            max_retries: 1,
            token: None,
        }
    }
}

impl std::fmt::Debug for MondayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MondayConfig")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("board_id", &self.board_id)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Heuristics used to recognise completion and the target group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Substrings of a status label that mean the work is finished.
    pub done_keywords: Vec<String>,
    /// Status indices treated as finished when the label says nothing.
    /// Board specific: monday.com assigns indices per board.
    pub done_indices: Vec<i64>,
    /// Column titles containing one of these are treated as status columns.
    pub status_title_hints: Vec<String>,
    /// Substrings of a group title that mark the "Done" group.
    pub group_keywords: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            done_keywords: ["done", "complete", "completed", "finished", "closed"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            done_indices: vec![1, 4, 40],
            status_title_hints: vec!["status".to_string()],
            group_keywords: ["done", "complete", "finished"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used for webhook callbacks and links.
    pub public_url: Option<String>,
    pub log_json: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: None,
            log_json: false,
        }
    }
}

/// Settings for the action-link writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    pub max_items: usize,
    pub text: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            max_items: 5,
            text: "Take Action".to_string(),
        }
    }
}

impl AutomationConfig {
    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the explicit file if given, else the default file if it exists,
    /// else built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Full startup resolution: file, then process environment.
    pub fn from_environment(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(explicit)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay environment values. `lookup` abstracts `std::env::var` so the
    /// layering can be exercised without touching process state.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("MONDAY_TOKEN") {
            self.monday.token = Some(token.trim().to_string());
        }
        if let Some(board_id) = non_empty("BOARD_ID") {
            self.monday.board_id = Some(board_id.trim().to_string());
        }
        if let Some(url) = non_empty("MONDAY_API_URL") {
            self.monday.api_url = url;
        }
        if let Some(url) = non_empty("PUBLIC_URL").or_else(|| non_empty("MONDAY_APP_URL")) {
            self.server.public_url = Some(url);
        }
        if let Some(port) = non_empty("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    key: "PORT".to_string(),
                    message: e.to_string(),
                })?;
        }
        if let Some(flag) = non_empty("LOG_JSON") {
            self.server.log_json = matches!(flag.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// The API token, required by every remote call.
    pub fn token(&self) -> Result<&str, ConfigError> {
        self.monday.token.as_deref().ok_or(ConfigError::MissingToken)
    }

    /// The board this deployment automates.
    pub fn board_id(&self) -> Result<&str, ConfigError> {
        self.monday
            .board_id
            .as_deref()
            .ok_or(ConfigError::MissingBoardId)
    }

    /// Public base URL without a trailing slash.
    pub fn public_url(&self) -> Result<String, ConfigError> {
        self.server
            .public_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "PUBLIC_URL".to_string(),
                message: "required to build callback URLs".to_string(),
            })
    }

    /// Extra attempts allowed per remote call, never more than one.
    pub fn retries(&self) -> u32 {
        self.monday.max_retries.min(1)
    }

    /// Non-fatal problems worth logging at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.monday.max_retries > 1 {
            warnings.push(format!(
                "monday.max_retries = {} exceeds the single-retry limit; using 1",
                self.monday.max_retries
            ));
        }
        if self.monday.timeout_secs == 0 {
            warnings.push("monday.timeout_secs = 0 makes every remote call time out".to_string());
        }
        if self.rules.group_keywords.is_empty() {
            warnings.push("rules.group_keywords is empty; no item will ever be moved".to_string());
        }
        if self.rules.done_keywords.is_empty() && self.rules.done_indices.is_empty() {
            warnings.push(
                "no rules.done_keywords or rules.done_indices; only checkboxes trigger moves"
                    .to_string(),
            );
        }
        if self.monday.board_id.is_none() {
            warnings.push("no board id configured; webhook events must carry boardId".to_string());
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AutomationConfig::default();
        assert_eq!(config.monday.api_url, "https://api.monday.com/v2");
        assert_eq!(config.monday.timeout_secs, 10);
        assert_eq!(config.rules.done_indices, vec![1, 4, 40]);
        assert_eq!(config.rules.group_keywords, vec!["done", "complete", "finished"]);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.links.max_items, 5);
        assert!(config.monday.token.is_none());
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = AutomationConfig::parse(
            r#"
            [monday]
            board_id = "42"

            [rules]
            done_indices = [7]
            "#,
        )
        .unwrap();
        assert_eq!(config.monday.board_id.as_deref(), Some("42"));
        assert_eq!(config.monday.api_version, "2024-10");
        assert_eq!(config.rules.done_indices, vec![7]);
        assert_eq!(config.rules.done_keywords.len(), 5);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_token_in_file_is_ignored() {
        let config = AutomationConfig::parse(
            r#"
            [monday]
            token = "should-not-load"
            "#,
        )
        .unwrap();
        assert!(config.monday.token.is_none());
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let err = AutomationConfig::load_or_default(Some(Path::new("/nonexistent/ba.toml")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_toml_reports_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[monday\nboard_id = ").unwrap();
        let err = AutomationConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board-automator.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\npublic_url = \"https://hooks.example.com/\"\n",
        )
        .unwrap();
        let config = AutomationConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.public_url().unwrap(), "https://hooks.example.com");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AutomationConfig::parse("[monday]\nboard_id = \"1\"\n").unwrap();
        config
            .apply_env(env(&[
                ("MONDAY_TOKEN", " secret "),
                ("BOARD_ID", "2"),
                ("PORT", "3000"),
                ("LOG_JSON", "true"),
            ]))
            .unwrap();
        assert_eq!(config.token().unwrap(), "secret");
        assert_eq!(config.board_id().unwrap(), "2");
        assert_eq!(config.server.port, 3000);
        assert!(config.server.log_json);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = AutomationConfig::default();
        config
            .apply_env(env(&[("MONDAY_TOKEN", "  "), ("BOARD_ID", "")]))
            .unwrap();
        assert!(matches!(config.token(), Err(ConfigError::MissingToken)));
        assert!(matches!(config.board_id(), Err(ConfigError::MissingBoardId)));
    }

    #[test]
    fn test_public_url_falls_back_to_app_url() {
        let mut config = AutomationConfig::default();
        config
            .apply_env(env(&[("MONDAY_APP_URL", "https://tunnel.example.com")]))
            .unwrap();
        assert_eq!(config.public_url().unwrap(), "https://tunnel.example.com");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = AutomationConfig::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = AutomationConfig::default();
        config.monday.token = Some("super-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_retries_are_clamped_to_one() {
        let mut config = AutomationConfig::default();
        config.monday.max_retries = 5;
        assert_eq!(config.retries(), 1);
        assert!(config.validate().iter().any(|w| w.contains("max_retries")));
        config.monday.max_retries = 0;
        assert_eq!(config.retries(), 0);
    }

    #[test]
    fn test_validate_flags_empty_group_keywords() {
        let mut config = AutomationConfig::default();
        config.monday.board_id = Some("1".into());
        assert!(config.validate().is_empty());
        config.rules.group_keywords.clear();
        assert_eq!(config.validate().len(), 1);
    }
}
