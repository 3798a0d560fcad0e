//! Server configuration loading.
//!
//! Precedence: built-in defaults, then `treepad.toml`, then environment
//! variables, then command-line flags (applied by the binary).

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub const CONFIG_FILE_NAME: &str = "treepad.toml";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3001";
pub const DEFAULT_GROQ_URL: &str = "https://api.groq.ai/v1/complete";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen: String,
    /// Workspace state file; relative paths resolve against the working directory.
    pub state_file: PathBuf,
    /// Base directory used while no workspace is active.
    pub default_dir: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub groq_api_key: Option<String>,
    pub groq_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub gpt_oss_url: Option<String>,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            state_file: PathBuf::from("server").join("workspaces.json"),
            default_dir: None,
            cors_origins: (3000..=3002)
                .map(|port| format!("http://localhost:{port}"))
                .collect(),
            ai: AiConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            groq_url: DEFAULT_GROQ_URL.to_string(),
            model: "groq-1".to_string(),
            max_tokens: 2000,
            temperature: 0.2,
            gpt_oss_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Loads `path`, or `treepad.toml` in the working directory when present.
    ///
    /// An explicit path must exist; the implicit file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE_NAME), false),
        };
        if !required && !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse { path, message },
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: ConfigToml = toml::from_str(text).map_err(|err| ConfigError::Parse {
            path: PathBuf::from(CONFIG_FILE_NAME),
            message: err.to_string(),
        })?;
        raw.into_config()
    }

    /// Applies `SERVER_PORT`, `FILE_DIR`, `GROQ_API_KEY` and `GPT_OSS_URL`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(port) = var("SERVER_PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.listen = with_port(&self.listen, port),
                Err(_) => warn!("ignoring invalid SERVER_PORT '{port}'"),
            }
        }
        if let Some(dir) = var("FILE_DIR") {
            self.default_dir = Some(PathBuf::from(dir));
        }
        if let Some(key) = var("GROQ_API_KEY") {
            self.ai.groq_api_key = Some(key);
        }
        if let Some(url) = var("GPT_OSS_URL") {
            self.ai.gpt_oss_url = Some(url);
        }
    }

    /// True when the CORS allow-list contains `origin`.
    #[must_use]
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.cors_origins.iter().any(|allowed| allowed == origin)
    }
}

/// Replaces the port of a `host:port` listen address.
#[must_use]
pub fn with_port(listen: &str, port: u16) -> String {
    let host = listen
        .rsplit_once(':')
        .map_or(listen, |(host, _)| host);
    let host = if host.is_empty() { "127.0.0.1" } else { host };
    format!("{host}:{port}")
}

#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    server: Option<ServerSection>,
    workspace: Option<WorkspaceSection>,
    cors: Option<CorsSection>,
    ai: Option<AiSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    listen: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceSection {
    default_dir: Option<PathBuf>,
    state_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct CorsSection {
    origins: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AiSection {
    groq_api_key: Option<String>,
    groq_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    gpt_oss_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl ConfigToml {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = ServerConfig::default();
        if let Some(server) = self.server {
            if let Some(listen) = server.listen {
                if !listen.contains(':') {
                    return Err(ConfigError::Invalid(format!(
                        "server.listen must be host:port, got '{listen}'"
                    )));
                }
                config.listen = listen;
            }
            if let Some(port) = server.port {
                config.listen = with_port(&config.listen, port);
            }
        }
        if let Some(workspace) = self.workspace {
            if let Some(state_file) = workspace.state_file {
                config.state_file = state_file;
            }
            config.default_dir = workspace.default_dir;
        }
        if let Some(origins) = self.cors.and_then(|cors| cors.origins) {
            config.cors_origins = origins;
        }
        if let Some(ai) = self.ai {
            let defaults = AiConfig::default();
            config.ai = AiConfig {
                groq_api_key: ai.groq_api_key,
                groq_url: ai.groq_url.unwrap_or(defaults.groq_url),
                model: ai.model.unwrap_or(defaults.model),
                max_tokens: ai.max_tokens.unwrap_or(defaults.max_tokens),
                temperature: ai.temperature.unwrap_or(defaults.temperature),
                gpt_oss_url: ai.gpt_oss_url,
                timeout: ai
                    .timeout_secs
                    .map_or(defaults.timeout, Duration::from_secs),
            };
            if !(0.0..=2.0).contains(&config.ai.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "ai.temperature must be within 0..=2, got {}",
                    config.ai.temperature
                )));
            }
        }
        Ok(config)
    }
}
