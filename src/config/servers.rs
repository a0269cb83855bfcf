//! `mcp_config.json` loading with environment variable resolution.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use super::{ConfigError, ConfigResult};
use crate::mcp::McpServerConfig;

/// Default location of the tool server list.
pub const CONFIG_FILE: &str = "mcp_config.json";

/// Declarative list of tool servers, keyed by server name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerConfigFile {
    servers: BTreeMap<String, McpServerConfig>,
}

impl ServerConfigFile {
    /// Reads the file and resolves `${VAR}` references from the process environment.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading tool server configuration");

        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let servers: BTreeMap<String, McpServerConfig> =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_servers(servers, lookup)
    }

    /// Resolves `${VAR}` references in already parsed server entries.
    pub fn from_servers<F>(
        mut servers: BTreeMap<String, McpServerConfig>,
        lookup: F,
    ) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, server) in servers.iter_mut() {
            let McpServerConfig::Stdio { args, env, .. } = server;
            for arg in args.iter_mut() {
                resolve(name, arg, &lookup)?;
            }
            for value in env.values_mut() {
                resolve(name, value, &lookup)?;
            }
        }
        Ok(Self { servers })
    }

    pub fn servers(&self) -> impl Iterator<Item = (&str, &McpServerConfig)> {
        self.servers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&McpServerConfig> {
        self.servers.get(name)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Replaces a whole-string `${NAME}` value with the variable's value.
fn resolve<F>(server: &str, value: &mut String, lookup: &F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(var) = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return Ok(());
    };

    let resolved = lookup(var).ok_or_else(|| ConfigError::MissingEnv {
        server: server.to_string(),
        var: var.to_string(),
    })?;
    *value = resolved;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    const SAMPLE: &str = r#"{
        "text": {
            "transport": "stdio",
            "command": "text-server",
            "args": ["--model", "${AGENT_MODEL}", "--verbose"],
            "env": {"OPENAI_API_KEY": "${OPENAI_API_KEY}", "MODE": "plain"}
        }
    }"#;

    #[test]
    fn test_load_resolves_env_references() {
        let (_dir, path) = write_config(SAMPLE);
        let config = ServerConfigFile::load_with(
            &path,
            env(&[("AGENT_MODEL", "gpt-4o"), ("OPENAI_API_KEY", "sk-test")]),
        )
        .unwrap();

        assert_eq!(config.len(), 1);
        let McpServerConfig::Stdio { args, env, .. } = config.get("text").unwrap();
        assert_eq!(args, &vec!["--model", "gpt-4o", "--verbose"]);
        assert_eq!(env["OPENAI_API_KEY"], "sk-test");
        assert_eq!(env["MODE"], "plain");
    }

    #[test]
    fn test_missing_env_fails_fast() {
        let (_dir, path) = write_config(SAMPLE);
        let err = ServerConfigFile::load_with(&path, env(&[("AGENT_MODEL", "gpt-4o")]))
            .unwrap_err();
        match err {
            ConfigError::MissingEnv { server, var } => {
                assert_eq!(server, "text");
                assert_eq!(var, "OPENAI_API_KEY");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfigFile::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let (_dir, path) = write_config("{ not json");
        let err = ServerConfigFile::load_with(&path, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_partial_reference_left_alone() {
        let (_dir, path) = write_config(
            r#"{"s": {"transport": "stdio", "command": "x", "args": ["prefix-${HOME}"]}}"#,
        );
        let config = ServerConfigFile::load_with(&path, env(&[])).unwrap();
        let McpServerConfig::Stdio { args, .. } = config.get("s").unwrap();
        assert_eq!(args[0], "prefix-${HOME}");
    }
}
