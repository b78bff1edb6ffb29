//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Forum backend configuration.
    pub forum: ForumConfig,
    /// Showcase workflow configuration.
    #[serde(default)]
    pub showcase: ShowcaseConfig,
    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub public_url: String,
}

/// Forum backend connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    /// Base URL of the forum API (e.g. `https://forum.example.com/api/v1`).
    pub base_url: String,
    /// Instance API key sent with every request.
    pub api_key: String,
    /// Total request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Page size requested from every paginated listing.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Showcase workflow configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShowcaseConfig {
    /// How long the public approved listing stays cached.
    #[serde(default = "default_listing_cache_ttl_secs")]
    pub listing_cache_ttl_secs: u64,
    /// Forum role that grants moderation rights.
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
    /// Maximum number of concurrent thread lookups per batch.
    #[serde(default = "default_pending_fetch_concurrency")]
    pub pending_fetch_concurrency: usize,
    /// Upper bound on pages fetched by a single drained listing.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for ShowcaseConfig {
    fn default() -> Self {
        Self {
            listing_cache_ttl_secs: default_listing_cache_ttl_secs(),
            admin_role: default_admin_role(),
            pending_fetch_concurrency: default_pending_fetch_concurrency(),
            max_pages: default_max_pages(),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Name of the HTTP-only cookie carrying the forum token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Whether the cookie is marked `Secure`.
    #[serde(default = "default_true")]
    pub secure_cookie: bool,
    /// Cookie lifetime in days.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure_cookie: true,
            max_age_days: default_max_age_days(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_page_size() -> u32 {
    50
}

const fn default_listing_cache_ttl_secs() -> u64 {
    60
}

fn default_admin_role() -> String {
    "admin".to_string()
}

const fn default_pending_fetch_concurrency() -> usize {
    16
}

const fn default_max_pages() -> usize {
    1000
}

fn default_cookie_name() -> String {
    "showcase_session".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_max_age_days() -> i64 {
    30
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `SHOWCASE_ENV`)
    /// 3. Environment variables with `SHOWCASE__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("SHOWCASE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SHOWCASE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SHOWCASE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                public_url = "https://showcase.example.com"

                [forum]
                base_url = "https://forum.example.com/api/v1"
                api_key = "key"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.forum.page_size, 50);
        assert_eq!(config.showcase.listing_cache_ttl_secs, 60);
        assert_eq!(config.showcase.admin_role, "admin");
        assert_eq!(config.session.cookie_name, "showcase_session");
        assert!(config.session.secure_cookie);
    }

    #[test]
    fn test_missing_forum_section_is_an_error() {
        let result: Result<Config, _> = config::Config::builder()
            .add_source(config::File::from_str(
                "[server]\npublic_url = \"https://x\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize();

        assert!(result.is_err());
    }
}
