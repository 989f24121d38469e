//! Board automation: move finished items into the board's Done group.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐  POST /webhook  ┌─────────────────────────────────────────────┐
//! │ monday   │ ──────────────> │  server.rs  (axum Router, TraceLayer)       │
//! │ .com     │ <────────────── │    └─ api.rs  (routes, AppState, ApiError)  │
//! └──────────┘   200 + JSON    │         │                                   │
//!                              │         │ webhook::handle_webhook()          │
//!                              │         v                                   │
//!                              │  webhook.rs  (parse, challenge, firewall)   │
//!                              │         │                                   │
//!                              │         │ StatusClassifier::classify()       │
//!                              │         v                                   │
//!                              │  classifier.rs  (pure, no I/O)              │
//!                              │         │                                   │
//!                              │         │ Reconciler::reconcile()            │
//!                              │         v                                   │
//!                              │  reconciler.rs ── resolver.rs               │
//!                              │         │                                   │
//!                              │         │ BoardClient (trait)                │
//!                              │         v                                   │
//!                              │  monday.rs  (GraphQL over reqwest)          │
//!                              └─────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module         | Responsibility                                          |
//! |----------------|---------------------------------------------------------|
//! | `models`       | `Group`, `Item`, `ColumnChangeEvent`, `MoveOutcome`     |
//! | `board_client` | `BoardClient` trait, the seam between logic and network |
//! | `admin`        | Task listing, webhook setup/cleanup, action links,      |
//! |                | button clicks, connectivity diagnostics                 |
//! | `fake`         | In-memory `FakeBoardClient` for tests                   |
//!
//! ## Typical Request Flow (status set to "Done")
//!
//! 1. `POST /webhook` → `api::receive_webhook()` opens a span with a fresh
//!    delivery id.
//! 2. `webhook::parse_payload()` echoes a `challenge`, or builds a
//!    `ColumnChangeEvent`; anything unparseable becomes `change_logged`.
//! 3. `StatusClassifier::classify()` decides whether the change means done.
//! 4. `Reconciler::reconcile()` reads the item and the board's groups, asks
//!    `GroupResolver` for the target, moves, then reads the item again.
//! 5. The `MoveOutcome` is rendered as `{success, action, ...}` with HTTP 200.

pub mod admin;
pub mod api;
pub mod board_client;
pub mod classifier;
pub mod fake;
pub mod models;
pub mod monday;
pub mod reconciler;
pub mod resolver;
pub mod server;
pub mod webhook;
