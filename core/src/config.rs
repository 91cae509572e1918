use crate::model::ExportFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SOCKET_PATH: &str = "/run/gvmd/gvmd.sock";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

pub const ENV_SOCKET_PATH: &str = "GVM_SOCKET_PATH";
pub const ENV_USERNAME: &str = "GVM_USERNAME";
pub const ENV_PASSWORD: &str = "GVM_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub socket_path: PathBuf,
    pub username: String,
    pub password: String,
    /// Socket read timeout; unset blocks until the daemon answers.
    pub read_timeout_secs: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            username: String::new(),
            password: String::new(),
            read_timeout_secs: None,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = if self.password.is_empty() { "" } else { "***" };
        f.debug_struct("ConnectionConfig")
            .field("socket_path", &self.socket_path)
            .field("username", &self.username)
            .field("password", &masked)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    /// Overall ceiling on the wait for completion. Unset polls forever.
    pub timeout_secs: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timeout_secs: None,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanflowConfig {
    pub connection: ConnectionConfig,
    pub poll: PollConfig,
    /// Matcher expression for the scanning engine, see `resolver::Matcher`.
    pub scanner: String,
    /// Matcher expression for the scan policy.
    pub scan_config: String,
    pub formats: Vec<ExportFormat>,
    pub convert_json: bool,
    pub output_dir: PathBuf,
    pub cleanup_on_failure: bool,
}

impl Default for ScanflowConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            poll: PollConfig::default(),
            scanner: "OpenVAS Default".to_string(),
            scan_config: "Full and fast".to_string(),
            formats: vec![ExportFormat::Pdf, ExportFormat::Csv],
            convert_json: true,
            output_dir: PathBuf::from("."),
            cleanup_on_failure: false,
        }
    }
}

impl ScanflowConfig {
    pub fn from_yaml_str(source: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(source).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content, path)
    }

    /// Defaults, then the optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let env: HashMap<String, String> = std::env::vars().collect();
        config.apply_env(&env);
        Ok(config)
    }

    pub fn apply_env(&mut self, env: &HashMap<String, String>) {
        if let Some(path) = env.get(ENV_SOCKET_PATH).filter(|v| !v.is_empty()) {
            self.connection.socket_path = PathBuf::from(path);
        }
        if let Some(username) = env.get(ENV_USERNAME) {
            self.connection.username = username.clone();
        }
        if let Some(password) = env.get(ENV_PASSWORD) {
            self.connection.password = password.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll interval must be at least one second".to_string(),
            ));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one export format is required".to_string(),
            ));
        }
        if self.scanner.trim().is_empty() || self.scan_config.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "scanner and scan config matchers must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
