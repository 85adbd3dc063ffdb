//! Trade bot CLI binary

use clap::Parser;
use std::time::Duration;
use tradebot::cli::{Cli, Commands, SettingsAction, TradeBotApp};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let app = TradeBotApp::from_paths(cli.config.as_deref(), cli.settings)?;

    match cli.command {
        Commands::Run { feed, linger_ms } => {
            let report = app
                .run_feed(&feed, Duration::from_millis(linger_ms))
                .await?;
            tracing::info!(
                "Feed done: {} events, {} queued, {} duplicates, {} dropped, {} malformed",
                report.lines,
                report.queued,
                report.duplicates,
                report.dropped,
                report.malformed
            );
        }

        Commands::Settings { action } => match action {
            SettingsAction::Get { key, default } => {
                println!("{}", app.settings_get(&key, default.as_deref()));
            }
            SettingsAction::Set { key, value } => {
                app.settings_set(&key, &value)?;
            }
            SettingsAction::List => {
                for (key, value) in app.settings_list() {
                    println!("{} = {}", key, value);
                }
            }
        },
    }

    Ok(())
}
