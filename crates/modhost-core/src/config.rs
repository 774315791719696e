//! Host configuration.
//!
//! Defaults come from build-time values, then an optional TOML file, then
//! environment variables (later sources win).

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::plugin::PluginError;

/// Default values.
pub mod defaults {
    /// Installation library prefix, fixed at build time.
    pub const LIBEXEC_DIR: &str = match option_env!("MODHOST_LIBEXECDIR") {
        Some(dir) => dir,
        None => "/usr/local/libexec",
    };
    /// Plugin directory relative to the library prefix.
    pub const PLUGIN_SUBDIR: &str = "modhost/lib/plugins";
    /// Deadline for one capability activation.
    pub const ACTIVATION_TIMEOUT_MS: u64 = 30_000;
    /// Configuration file name.
    pub const CONFIG_FILE_NAME: &str = "modhost.toml";
}

/// Environment variable names.
pub mod env_vars {
    pub const LIBEXEC_DIR: &str = "MODHOST_LIBEXECDIR";
    pub const ACTIVATION_TIMEOUT_MS: &str = "MODHOST_ACTIVATION_TIMEOUT_MS";
    pub const LOG_JSON: &str = "MODHOST_LOG_JSON";
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Plugin host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Installation library prefix.
    pub libexec_dir: PathBuf,
    /// Activation deadline in milliseconds, `0` disables it.
    pub activation_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            libexec_dir: PathBuf::from(defaults::LIBEXEC_DIR),
            activation_timeout_ms: defaults::ACTIVATION_TIMEOUT_MS,
        }
    }
}

impl HostConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Read a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `MODHOST_*` environment variables.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup(env_vars::LIBEXEC_DIR).filter(|d| !d.trim().is_empty()) {
            self.libexec_dir = PathBuf::from(dir.trim());
        }
        if let Some(value) = lookup(env_vars::ACTIVATION_TIMEOUT_MS) {
            self.activation_timeout_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: env_vars::ACTIVATION_TIMEOUT_MS,
                        value,
                    })?;
        }
        Ok(self)
    }

    /// Directory holding the installed plugins.
    pub fn plugin_dir(&self) -> PathBuf {
        self.libexec_dir.join(defaults::PLUGIN_SUBDIR)
    }

    pub fn activation_timeout(&self) -> Option<Duration> {
        match self.activation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Resolve a logical plugin name to its absolute path.
    ///
    /// Names must be relative and stay inside the plugin directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, PluginError> {
        let trimmed = name.trim();
        let escapes = Path::new(trimmed)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if trimmed.is_empty() || escapes {
            return Err(PluginError::InvalidName(name.to_string()));
        }
        Ok(self.plugin_dir().join(trimmed))
    }
}
