use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use board_automator::config::AutomationConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "board-automator")]
#[command(version, about = "Move monday.com items to their Done group when work completes")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (defaults to ./board-automator.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Board to operate on. Overrides BOARD_ID and the config file.
    #[arg(long, global = true)]
    pub board_id: Option<String>,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook and admin HTTP server
    Serve {
        /// Port to listen on (overrides PORT and the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the board's items and the group each is in
    Tasks,
    /// Show columns, groups, webhooks and the resolved Done group
    Board,
    /// Manage the board's webhook subscriptions
    Webhook {
        #[command(subcommand)]
        command: WebhookCommands,
    },
    /// Write action links into the board's first link column
    Links,
    /// Move one item to the Done group now
    Move {
        /// Item (pulse) id
        item_id: String,
    },
    /// Check that the token works and can see the board
    Check,
}

#[derive(Subcommand, Clone, Copy)]
pub enum WebhookCommands {
    /// Register a column-change webhook pointing at PUBLIC_URL/webhook
    Create,
    /// Delete every webhook on the board
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let mut config = AutomationConfig::from_environment(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(board_id) = &cli.board_id {
        config.monday.board_id = Some(board_id.clone());
    }

    board_automator::logging::init_tracing(cli.verbose, config.server.log_json);

    match &cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = *port;
            }
            cmd::cmd_serve(config).await?;
        }
        Commands::Tasks => cmd::cmd_tasks(config, cli.json).await?,
        Commands::Board => cmd::cmd_board(config, cli.json).await?,
        Commands::Webhook { command } => cmd::cmd_webhook(config, *command, cli.json).await?,
        Commands::Links => cmd::cmd_links(config, cli.json).await?,
        Commands::Move { item_id } => cmd::cmd_move(config, item_id, cli.json).await?,
        Commands::Check => cmd::cmd_check(config, cli.json).await?,
    }

    Ok(())
}
