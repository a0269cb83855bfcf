//! Model provider and loop settings read from the environment.

use std::time::Duration;

use secrecy::SecretString;

use super::{ConfigError, ConfigResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_CYCLES: usize = 25;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CHUNK_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct Settings {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    /// `None` when `AGENT_MAX_CYCLES=0`, which disables the cap
    pub max_cycles: Option<usize>,
    pub tool_timeout: Duration,
    pub chunk_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSetting {
                key: "OPENAI_API_KEY".into(),
            })?;

        let max_cycles = match parse_number(&lookup, "AGENT_MAX_CYCLES")? {
            Some(0) => None,
            Some(n) => Some(n as usize),
            None => Some(DEFAULT_MAX_CYCLES),
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url: lookup("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            model: lookup("AGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            max_cycles,
            tool_timeout: parse_timeout(&lookup, "AGENT_TOOL_TIMEOUT_SECS", DEFAULT_TOOL_TIMEOUT_SECS)?,
            chunk_timeout: parse_timeout(
                &lookup,
                "AGENT_CHUNK_TIMEOUT_SECS",
                DEFAULT_CHUNK_TIMEOUT_SECS,
            )?,
        })
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> ConfigResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("'{}': {}", raw, e),
                })
        })
        .transpose()
}

/// A timeout in whole seconds. Zero is rejected.
fn parse_timeout<F>(lookup: &F, key: &str, default: u64) -> ConfigResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_number(lookup, key)? {
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "timeout must be at least 1 second".to_string(),
        }),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(Duration::from_secs(default)),
    }
}
