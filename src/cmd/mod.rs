//! CLI command implementations.
//!
//! | Module    | Commands handled                                  |
//! |-----------|---------------------------------------------------|
//! | `serve`   | `Serve`                                           |
//! | `board`   | `Tasks`, `Board`, `Webhook`, `Links`, `Move`,     |
//! |           | `Check`                                           |

pub mod board;
pub mod serve;

pub use board::{cmd_board, cmd_check, cmd_links, cmd_move, cmd_tasks, cmd_webhook};
pub use serve::cmd_serve;
