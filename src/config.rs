//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub fetcher: FetcherConfig,
    pub cache: CacheConfig,
    pub profile: ProfileConfig,
    pub decoration: DecorationConfig,
    pub poll: PollConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Origin of the site consuming the API (e.g., "https://portfolio.example.com")
    ///
    /// CORS is permissive when unset.
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

/// External fetch process configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Interpreter used to run the scripts (e.g., "/usr/bin/python3")
    pub interpreter: PathBuf,
    /// Working directory for the scripts
    pub working_dir: PathBuf,
    /// Script listing an account's gifts (`<script> @handle --include-user`)
    pub gifts_script: PathBuf,
    /// Script reporting an account's worn decoration (`<script> handle`)
    pub profile_script: PathBuf,
    /// Kill the process after this many seconds (default: 45)
    pub timeout_seconds: u64,
    /// Bytes retained per output stream (default: 4 MiB)
    pub max_output_bytes: usize,
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Cache backend selector
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// SQLite unless the host forbids local writes
    #[default]
    Auto,
    Sqlite,
    Disabled,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub mode: CacheMode,
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Profile defaults
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Account served when the request names none
    pub default_username: String,
}

/// Decoration lookup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DecorationConfig {
    /// Give up on decoration data for cached responses after this long (default: 2000)
    pub timeout_ms: u64,
}

impl DecorationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Client-side poll configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Delay before re-fetching while a refresh is in flight (default: 4000)
    pub delay_ms: u64,
}

impl PollConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        format!("giftsync={},tower_http=debug", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (GIFTSYNC__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("fetcher.interpreter", "/usr/bin/python3")?
            .set_default("fetcher.working_dir", ".")?
            .set_default("fetcher.gifts_script", "bot/services/get_profile_gifts.py")?
            .set_default("fetcher.profile_script", "bot/services/get_user_profile.py")?
            .set_default("fetcher.timeout_seconds", 45)?
            .set_default("fetcher.max_output_bytes", 4 * 1024 * 1024)?
            .set_default("cache.mode", "auto")?
            .set_default("cache.path", "data/profile_cache.db")?
            .set_default("profile.default_username", "yousefmsm1")?
            .set_default("decoration.timeout_ms", 2000)?
            .set_default("poll.delay_ms", 4000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("GIFTSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.fetcher.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "fetcher.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.fetcher.max_output_bytes == 0 {
            return Err(crate::error::AppError::Config(
                "fetcher.max_output_bytes must be greater than 0".to_string(),
            ));
        }

        if self.decoration.timeout_ms == 0 {
            return Err(crate::error::AppError::Config(
                "decoration.timeout_ms must be greater than 0".to_string(),
            ));
        }

        crate::data::AccountHandle::parse(&self.profile.default_username).map_err(|e| {
            crate::error::AppError::Config(format!("profile.default_username is invalid: {e}"))
        })?;

        Ok(())
    }
}
