use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing_subscriber::EnvFilter;

use filegate::{Relay, RelayConfig, TelegramPlatform, telegram};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("filegate.toml"));

    let config = RelayConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let token = config.resolve_token().context("bot token missing")?;

    tracing::info!(
        bot_username = %config.bot_username,
        storage_channel = config.storage_channel,
        required_channels = config.required_channels.len(),
        "starting filegate"
    );

    let bot = Bot::new(token);
    let platform = Arc::new(TelegramPlatform::new(bot.clone(), config.storage_channel));
    let relay = Arc::new(Relay::new(platform, config).context("invalid configuration")?);

    telegram::run(bot, relay).await;
    Ok(())
}
