pub mod api;
pub mod config;
pub mod error;
pub mod notifier;
pub mod reporter;
pub mod scheduler;
pub mod tracker;
pub mod types;

/// OpenSea v1 events endpoint (public, optional API key).
pub const OPENSEA_EVENTS_URL: &str = "https://api.opensea.io/api/v1/events";

/// Discord REST API base URL.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
