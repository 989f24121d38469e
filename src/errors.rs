//! Typed error hierarchy for the board automator.
//!
//! - `BoardError`: anything that goes wrong talking to the remote board API
//! - `ConfigError`: loading and validating configuration
//! - `AdminError`: board administration, wrapping the two above

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from the remote board client.
///
/// The remote API answers HTTP 200 for many failures and reports them in an
/// `errors` array instead, so `Remote` is the common case, not `Status`.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Remote API error: {}", messages.join(", "))]
    Remote { messages: Vec<String> },

    #[error("Remote API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Remote call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Remote response missing {0}")]
    MissingData(String),

    #[error("Failed to decode remote response: {0}")]
    Decode(String),
}

impl BoardError {
    /// Whether a second attempt could plausibly succeed.
    ///
    /// Only transport-level trouble qualifies. An error the remote platform
    /// reported about the operation itself is final.
    pub fn is_transient(&self) -> bool {
        match self {
            BoardError::Transport(_) | BoardError::Timeout { .. } => true,
            BoardError::Status { status, .. } => *status == 429 || *status >= 500,
            BoardError::Remote { .. } | BoardError::MissingData(_) | BoardError::Decode(_) => {
                false
            }
        }
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("MONDAY_TOKEN is not set; export it or add it to .env")]
    MissingToken,

    #[error("No board id configured; set BOARD_ID, [monday].board_id, or pass --board-id")]
    MissingBoardId,

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from board administration (webhook setup, listings, links).
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Board(#[from] BoardError),

    /// The board is not in a state the operation can work with.
    #[error("{0}")]
    Precondition(String),
}
