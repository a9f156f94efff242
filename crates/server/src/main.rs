mod health;
pub mod lead;

use std::sync::Arc;

use anyhow::Result;
use arbora_core::config::{AppConfig, LoadOptions};
use arbora_telegram::client::{MessageSink, TelegramClient};

fn init_logging(config: &AppConfig) {
    use arbora_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let sink = build_sink(&config);
    let app = lead::router(sink.clone()).merge(health::router(sink.is_some()));

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        telegram_configured = sink.is_some(),
        "lead relay started"
    );

    axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopped", "lead relay stopped");
    Ok(())
}

/// Credentials absent is warn-and-continue: the relay boots and answers
/// lead requests with the configuration-error contract instead.
fn build_sink(config: &AppConfig) -> Option<Arc<dyn MessageSink>> {
    if !config.telegram.is_configured() {
        tracing::warn!(
            event_name = "system.telegram.unconfigured",
            "telegram credentials missing; leads will be logged and rejected"
        );
        return None;
    }

    let bot_token = config.telegram.bot_token.clone()?;
    let chat_id = config.telegram.chat_id.clone()?;
    Some(Arc::new(TelegramClient::new(bot_token, chat_id)))
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
