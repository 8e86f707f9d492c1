use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::platform::ChannelRef;
use crate::shortener::ShortenerConfig;

/// Top-level configuration loaded from `filegate.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Bot token. Falls back to the `FILEGATE_BOT_TOKEN` env var when absent.
    #[serde(default)]
    pub token: Option<String>,

    /// Bot username (without `@`), used to build deep links.
    pub bot_username: String,

    /// Private channel holding canonical copies of admin uploads.
    pub storage_channel: i64,

    /// The one administrator identity.
    pub admin_id: i64,

    /// Channels a user must have joined before content is delivered.
    /// Entries are numeric chat ids or `@handles`.
    #[serde(default)]
    pub required_channels: Vec<String>,

    /// Seed shortener credentials; overridable at runtime via `/shortener`,
    /// reverts to this seed on restart.
    #[serde(default)]
    pub shortener: ShortenerConfig,
}

impl RelayConfig {
    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    /// Resolve the bot token: explicit config value first, then environment.
    pub fn resolve_token(&self) -> Result<String, Error> {
        if let Some(token) = &self.token
            && !token.is_empty()
        {
            return Ok(token.clone());
        }
        std::env::var("FILEGATE_BOT_TOKEN").map_err(|_| {
            Error::Config("bot token missing: set `token` or FILEGATE_BOT_TOKEN".into())
        })
    }

    /// Parse `required_channels` into channel references.
    pub fn parse_required_channels(&self) -> Result<Vec<ChannelRef>, Error> {
        self.required_channels
            .iter()
            .map(|raw| ChannelRef::parse(raw))
            .collect()
    }
}
