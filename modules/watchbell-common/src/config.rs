use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat-platform bot token used by the outbound message sender.
    pub bot_token: String,

    /// Postgres connection string. When unset the bot runs on the
    /// in-memory store (state is lost on restart).
    pub database_url: Option<String>,

    // Upstream endpoints (overridable for tests/staging)
    pub anilist_url: String,
    pub mangadex_url: String,

    // Liveness web server
    pub web_host: String,
    pub web_port: u16,

    /// Seconds between reconciliation ticks.
    pub tick_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            bot_token: required_env("BOT_TOKEN"),
            database_url: env::var("DATABASE_URL").ok(),
            anilist_url: env::var("ANILIST_URL")
                .unwrap_or_else(|_| "https://graphql.anilist.co".to_string()),
            mangadex_url: env::var("MANGADEX_URL")
                .unwrap_or_else(|_| "https://api.mangadex.org".to_string()),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            tick_interval_secs: env::var("TICK_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("TICK_INTERVAL_SECS must be a number"),
        }
    }

    /// Log the loaded configuration with secrets redacted.
    pub fn log_redacted(&self) {
        info!(
            database = if self.database_url.is_some() { "postgres" } else { "memory" },
            anilist_url = self.anilist_url.as_str(),
            mangadex_url = self.mangadex_url.as_str(),
            web_host = self.web_host.as_str(),
            web_port = self.web_port,
            tick_interval_secs = self.tick_interval_secs,
            bot_token = "***",
            "Configuration loaded"
        );
    }
}

fn required_env(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("{name} environment variable is required"))
}
