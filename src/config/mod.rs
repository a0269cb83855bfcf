//! Startup configuration: the tool server list and provider settings.
//!
//! ```rust,no_run
//! use mcp_agent::config::{ServerConfigFile, Settings};
//!
//! # fn example() -> Result<(), mcp_agent::config::ConfigError> {
//! mcp_agent::config::load_dotenv();
//! let servers = ServerConfigFile::load("mcp_config.json")?;
//! let settings = Settings::from_env()?;
//! # Ok(())
//! # }
//! ```

pub mod servers;
pub mod settings;

pub use servers::{CONFIG_FILE, ServerConfigFile};
pub use settings::Settings;

use std::path::PathBuf;
use std::sync::Once;

use thiserror::Error;

static ENV_LOADER: Once = Once::new();

/// Loads `.env` from the working directory once per process. A missing file is ignored.
pub fn load_dotenv() {
    ENV_LOADER.call_once(|| {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded environment file");
        }
    });
}

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Environment variable {var} referenced by server '{server}' is not set")]
    MissingEnv { server: String, var: String },

    #[error("Required setting {key} is not set")]
    MissingSetting { key: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
