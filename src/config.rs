use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::OPENSEA_EVENTS_URL;
use crate::error::TrackerError;
use crate::types::{DuplicatePolicy, EventKind};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable overriding `discord.bot_token`.
pub const BOT_TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";

/// Environment variable overriding `opensea.api_key`.
pub const API_KEY_ENV: &str = "OPENSEA_API_KEY";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub opensea: OpenSeaConfig,
    pub settings: SettingsConfig,
}

/// Chat credentials and target channel.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token; may be left empty and supplied through `DISCORD_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: String,
    pub channel_id: u64,
}

/// Marketplace endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSeaConfig {
    #[serde(default = "default_events_url")]
    pub events_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// `event_type` sent for bids.
    #[serde(default = "default_bid_event_type")]
    pub bid_event_type: String,
}

fn default_events_url() -> String {
    OPENSEA_EVENTS_URL.to_string()
}

fn default_bid_event_type() -> String {
    EventKind::Bid.api_event_type().to_string()
}

impl Default for OpenSeaConfig {
    fn default() -> Self {
        Self {
            events_url: default_events_url(),
            api_key: None,
            bid_event_type: default_bid_event_type(),
        }
    }
}

/// Runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    /// Collection contract addresses, as an array or a `;`-separated string.
    #[serde(deserialize_with = "deserialize_contracts")]
    pub asset_contracts: Vec<String>,
    /// Polling interval in seconds; fractions allowed.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: f64,
    #[serde(default)]
    pub print_sales_to_console: bool,
    #[serde(default)]
    pub print_bids_to_console: bool,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

fn default_ping_interval() -> f64 {
    60.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContractList {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_contracts<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ContractList::deserialize(deserializer)? {
        ContractList::List(items) => items
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        ContractList::Joined(joined) => parse_contract_list(&joined),
    })
}

/// Split a `;`-separated contract list, ignoring line breaks and empty entries.
pub fn parse_contract_list(joined: &str) -> Vec<String> {
    joined
        .replace(['\n', '\r'], "")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep only the last four characters of a secret.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

impl AppConfig {
    /// Parse config from TOML text without consulting the environment.
    pub fn parse(contents: &str) -> std::result::Result<Self, TrackerError> {
        toml::from_str(contents).map_err(|e| TrackerError::Config(e.to_string()))
    }

    /// Load, apply environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config =
            Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
        config.apply_overrides(std::env::var(BOT_TOKEN_ENV).ok(), std::env::var(API_KEY_ENV).ok());
        config
            .validate()
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Non-empty values replace the file's token and API key.
    pub fn apply_overrides(&mut self, bot_token: Option<String>, api_key: Option<String>) {
        if let Some(token) = bot_token.filter(|t| !t.is_empty()) {
            self.discord.bot_token = token;
        }
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.opensea.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> std::result::Result<(), TrackerError> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(TrackerError::Config(format!(
                "discord.bot_token is empty (set it or {BOT_TOKEN_ENV})"
            )));
        }
        if self.discord.channel_id == 0 {
            return Err(TrackerError::Config("discord.channel_id must be non-zero".into()));
        }
        if self.settings.asset_contracts.is_empty() {
            return Err(TrackerError::Config(
                "settings.asset_contracts lists no collections".into(),
            ));
        }
        let secs = self.settings.ping_interval_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(TrackerError::Config(format!(
                "settings.ping_interval_secs must be positive, got {secs}"
            )));
        }
        Ok(())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs_f64(self.settings.ping_interval_secs)
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_summary(&self) {
        info!("Discord bot token:       {}", mask_secret(&self.discord.bot_token));
        info!("Discord channel id:      {}", self.discord.channel_id);
        info!("Events endpoint:         {}", self.opensea.events_url);
        info!("Asset contracts to scan: {}", self.settings.asset_contracts.len());
        for contract in &self.settings.asset_contracts {
            info!("  -> {contract}");
        }
        info!("Ping interval (seconds): {}", self.settings.ping_interval_secs);
        info!("Print sales to console:  {}", self.settings.print_sales_to_console);
        info!("Print bids to console:   {}", self.settings.print_bids_to_console);
        info!("Duplicate policy:        {:?}", self.settings.duplicate_policy);
    }
}
