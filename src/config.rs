use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Lavalink
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,
    pub lavalink_secure: bool,

    // Autoplay
    pub search_engine: String, // Prefijo de búsqueda: ytsearch, ytmsearch, scsearch...

    // Audio
    pub default_volume: u16, // Porcentaje, como lo entiende Lavalink

    // Eventos
    pub event_bus_capacity: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            lavalink_host: std::env::var("LAVALINK_HOST").unwrap_or(defaults.lavalink_host),
            lavalink_port: match std::env::var("LAVALINK_PORT") {
                Ok(val) if !val.trim().is_empty() => val.parse()?,
                _ => defaults.lavalink_port,
            },
            lavalink_password: std::env::var("LAVALINK_PASSWORD")
                .unwrap_or(defaults.lavalink_password),
            lavalink_secure: std::env::var("LAVALINK_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            search_engine: std::env::var("SEARCH_ENGINE").unwrap_or(defaults.search_engine),

            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            event_bus_capacity: std::env::var("EVENT_BUS_CAPACITY")
                .unwrap_or_else(|_| "256".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Port must be non-zero
    /// - Search engine prefix must be non-empty and must not contain `:`
    ///   (it is joined to the query with one)
    /// - Volume must be between 0 and 200
    /// - Event bus capacity must be > 0
    pub fn validate(&self) -> Result<()> {
        if self.lavalink_host.trim().is_empty() {
            anyhow::bail!("Lavalink host must not be empty");
        }

        if self.lavalink_port == 0 {
            anyhow::bail!("Lavalink port must be greater than 0");
        }

        if self.search_engine.trim().is_empty() || self.search_engine.contains(':') {
            anyhow::bail!("Invalid search engine prefix: {:?}", self.search_engine);
        }

        if self.default_volume > 200 {
            anyhow::bail!("Default volume must be between 0 and 200, got: {}", self.default_volume);
        }

        if self.event_bus_capacity == 0 {
            anyhow::bail!("Event bus capacity must be greater than 0");
        }

        Ok(())
    }

    /// Base URL of the Lavalink REST API.
    pub fn lavalink_url(&self) -> String {
        let scheme = if self.lavalink_secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.lavalink_host, self.lavalink_port)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Lavalink password is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Lavalink: {}\n  \
            Autoplay: search engine '{}'\n  \
            Audio: {}% vol\n  \
            Events: bus capacity {}",
            self.lavalink_url(),
            self.search_engine,
            self.default_volume,
            self.event_bus_capacity,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            lavalink_host: "localhost".to_string(),
            lavalink_port: 2333,
            lavalink_password: "youshallnotpass".to_string(),
            lavalink_secure: false,

            search_engine: "ytsearch".to_string(),

            default_volume: 100,

            event_bus_capacity: 256,
        }
    }
}
