//! One-shot board administration commands:
//! `board-automator tasks|board|webhook|links|move|check`.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use board_automator::automation::admin;
use board_automator::automation::api::AppState;
use board_automator::automation::monday::MondayClient;
use board_automator::config::AutomationConfig;

use super::super::WebhookCommands;

fn build_state(config: AutomationConfig) -> Result<AppState> {
    config.token()?;
    let client = MondayClient::from_config(&config).context("Failed to build API client")?;
    Ok(AppState::new(config, Arc::new(client)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn cmd_tasks(config: AutomationConfig, json: bool) -> Result<()> {
    let state = build_state(config)?;
    let list = admin::list_tasks(&state).await?;
    if json {
        return print_json(&list);
    }

    println!(
        "{} ({} tasks)",
        console::style(&list.board_name).bold().cyan(),
        list.task_count
    );
    for task in &list.tasks {
        println!(
            "  {:<12} {:<40} {}",
            task.id,
            task.name,
            console::style(&task.group).dim()
        );
    }
    Ok(())
}

pub async fn cmd_board(config: AutomationConfig, json: bool) -> Result<()> {
    let state = build_state(config)?;
    let structure = admin::board_structure(&state).await?;
    if json {
        return print_json(&structure);
    }

    println!(
        "{} {}",
        console::style("Board").bold().cyan(),
        structure.board_id
    );
    println!();
    println!("Columns:");
    for column in &structure.columns {
        let marker = if structure.status_columns.iter().any(|c| c.id == column.id) {
            console::style("status").green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<20} {:<30} {:<10} {}",
            column.id, column.title, column.column_type, marker
        );
    }
    println!();
    println!("Groups:");
    for group in &structure.groups {
        let is_done = structure
            .done_group
            .as_ref()
            .is_some_and(|g| g.id == group.id);
        if is_done {
            println!(
                "  {:<20} {} {}",
                group.id,
                group.title,
                console::style("← Done").green()
            );
        } else {
            println!("  {:<20} {}", group.id, group.title);
        }
    }
    if structure.done_group.is_none() {
        println!(
            "  {}",
            console::style("No Done-like group; completed items will not be moved").yellow()
        );
    }
    println!();
    println!("Webhooks: {}", structure.webhooks.len());
    for webhook in &structure.webhooks {
        println!(
            "  {:<12} {:<24} {}",
            webhook.id,
            webhook.event,
            webhook.config.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn cmd_webhook(
    config: AutomationConfig,
    command: WebhookCommands,
    json: bool,
) -> Result<()> {
    let state = build_state(config)?;
    match command {
        WebhookCommands::Create => {
            let setup = admin::setup_webhook(&state).await?;
            if json {
                return print_json(&setup);
            }
            println!(
                "{} webhook {} → {}",
                console::style("Created").green().bold(),
                setup.webhook_id,
                setup.webhook_url
            );
            let titles: Vec<&str> = setup
                .status_columns
                .iter()
                .map(|c| c.title.as_str())
                .collect();
            println!("Watching status columns: {}", titles.join(", "));
        }
        WebhookCommands::Delete => {
            let cleanup = admin::delete_webhooks(&state).await?;
            if json {
                return print_json(&cleanup);
            }
            println!(
                "Deleted {}/{} webhooks",
                cleanup.deleted_count, cleanup.total_found
            );
            if !cleanup.failed.is_empty() {
                println!(
                    "{} {}",
                    console::style("Failed:").red().bold(),
                    cleanup.failed.join(", ")
                );
            }
        }
    }
    Ok(())
}

pub async fn cmd_links(config: AutomationConfig, json: bool) -> Result<()> {
    let state = build_state(config)?;
    let report = admin::create_link_buttons(&state).await?;
    if json {
        return print_json(&report);
    }
    println!(
        "Wrote action links into \"{}\" for {}/{} items",
        report.link_column,
        report.items_updated,
        report.items_updated + report.items_failed
    );
    if report.items_failed > 0 {
        println!(
            "{} {} items could not be updated",
            console::style("Warning:").yellow(),
            report.items_failed
        );
    }
    Ok(())
}

pub async fn cmd_move(config: AutomationConfig, item_id: &str, json: bool) -> Result<()> {
    let state = build_state(config)?;
    let response = admin::link_action(&state, item_id, "cli").await?;
    if json {
        print_json(&response)?;
    } else {
        let status = if response.success {
            console::style(response.action.as_str()).green().bold()
        } else {
            console::style(response.action.as_str()).red().bold()
        };
        println!("{} {}", status, response.detail);
    }
    if !response.success {
        anyhow::bail!("Item {} was not confirmed in the Done group", item_id);
    }
    Ok(())
}

pub async fn cmd_check(config: AutomationConfig, json: bool) -> Result<()> {
    let state = build_state(config)?;
    let report = admin::diagnose(&state).await?;
    if json {
        print_json(&report)?;
    } else {
        println!(
            "{} {} (API {})",
            console::style("Endpoint").bold().cyan(),
            report.api_url,
            report.api_version
        );
        match &report.account {
            Some(account) => println!(
                "  {} account {} ({})",
                console::style("ok").green(),
                account.name,
                account.id
            ),
            None => println!("  {} account", console::style("failed").red()),
        }
        match &report.board {
            Some(board) => println!(
                "  {} board {} \"{}\", permissions: {}",
                console::style("ok").green(),
                board.id,
                board.name,
                board.permissions
            ),
            None => println!("  {} board {}", console::style("failed").red(), report.board_id),
        }
        if let Some(count) = report.webhook_count {
            println!("  {} {} webhooks", console::style("ok").green(), count);
        }
        for error in &report.errors {
            println!("  {} {}", console::style("Error:").red().bold(), error);
        }
    }
    if !report.success {
        anyhow::bail!("{} of 3 checks failed", report.errors.len());
    }
    Ok(())
}
