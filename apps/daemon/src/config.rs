//! Daemon configuration loaded from TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

/// Config directory name under the platform config dir.
pub const CONFIG_DIR: &str = "vncgate";
/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "vncgate.toml";

/// Resolve the global configuration directory (`~/.config/vncgate/` on unix).
pub fn global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR))
}

/// Top-level daemon configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub listen: ListenConfig,
    pub auth: AuthConfig,
    pub privilege: PrivilegeConfig,
    pub admission: AdmissionSettings,
    pub cookie: CookieConfig,
}

/// Protocol listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub addr: SocketAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 5900)),
        }
    }
}

/// Credential sources. With none configured, authentication is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Password file; an `rm:` prefix deletes it after the first read.
    pub passwdfile: Option<String>,
    /// Inline full-control passwords (supports `${ENV_VAR}` expansion).
    pub passwd: Vec<String>,
    /// Inline view-only passwords.
    pub view_passwd: Vec<String>,
    /// Seconds a peer gets to answer the challenge.
    pub handshake_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            passwdfile: None,
            passwd: Vec::new(),
            view_passwd: Vec::new(),
            handshake_timeout_secs: 30,
        }
    }
}

impl AuthConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// Privilege drop target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegeConfig {
    /// `user`, `user:group`, `uid` or `uid:gid`.
    pub user: Option<String>,
    /// Exit when the drop fails or cannot be verified.
    pub strict: bool,
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            user: None,
            strict: true,
        }
    }
}

/// Waiting strategy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Accept,
    Bootstrap,
    Lurk,
}

/// Admission loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionSettings {
    pub mode: Mode,
    /// Exit after the first connection closes.
    pub once: bool,
    /// Lurk marker file. Without one, lurk mode waits for SIGUSR1.
    pub lurk_file: Option<PathBuf>,
    pub lurk_poll_ms: u64,
    /// Bootstrap HTTP address.
    pub http_listen: SocketAddr,
    /// Bootstrap page template; `{port}` is replaced with the protocol port.
    pub http_page: Option<PathBuf>,
    pub max_failures: u32,
    pub failure_backoff_ms: u64,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Accept,
            once: false,
            lurk_file: None,
            lurk_poll_ms: 500,
            http_listen: SocketAddr::from(([0, 0, 0, 0], 5800)),
            http_page: None,
            max_failures: 5,
            failure_backoff_ms: 2000,
        }
    }
}

/// Display-manager cookie bridge.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// X display number whose cookie becomes a full-control password.
    pub display: Option<u32>,
    /// Explicit Xauthority file; otherwise well-known display manager
    /// locations are searched.
    pub xauthority: Option<PathBuf>,
}

impl DaemonConfig {
    /// Parse a TOML string, expanding `${ENV_VAR}` references first.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let expanded = crate::utils::expand_env_vars(toml_str);
        let config: Self = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Load `path` if given, else the global config file if it exists,
    /// else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match global_config_dir().map(|dir| dir.join(CONFIG_FILE)) {
            Some(path) if path.exists() => {
                tracing::info!("loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
