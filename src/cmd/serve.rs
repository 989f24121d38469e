//! Webhook server command: `board-automator serve`.

use anyhow::Result;

use board_automator::config::AutomationConfig;

pub async fn cmd_serve(config: AutomationConfig) -> Result<()> {
    if config.server.public_url.is_none() {
        println!(
            "{} PUBLIC_URL is not set; `webhook create` and `links` will not work",
            console::style("Note:").yellow()
        );
    }
    board_automator::automation::server::start_server(config).await
}
