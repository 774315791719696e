//! Plugin discovery, capability detection and registries for modhost.
//!
//! Plugins are dynamic libraries built with `modhost-sdk`. The host opens a
//! library, detects which capability contracts its entry satisfies, records
//! one handle per contract and activates each contract once.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modhost_core::plugin::MountProvider;
//!
//! # async fn run() -> modhost_core::plugin::Result<()> {
//! modhost_core::load("echo.so").await?;
//!
//! let init = modhost_core::get_by_name("echo.so")?;
//! init.init().ok();
//!
//! let mount = modhost_core::global().get_by_name::<MountProvider>("echo.so")?;
//! mount.mount().ok();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use once_cell::sync::Lazy;

pub mod config;
pub mod plugin;

pub use config::{ConfigError, HostConfig};
pub use plugin::{
    Capability, CapabilitySet, InitializerHandle, LoadedPlugin, PluginError, PluginHost, Result,
};

/// Process-wide host, configured from the environment on first use.
static GLOBAL: Lazy<PluginHost> = Lazy::new(|| {
    let config = HostConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Invalid plugin host environment, using defaults");
        HostConfig::default()
    });
    PluginHost::new(config)
});

/// The process-wide plugin host.
pub fn global() -> &'static PluginHost {
    &GLOBAL
}

/// Load a plugin into the process-wide host.
pub async fn load(name_or_path: &str) -> Result<Arc<LoadedPlugin>> {
    global().load(name_or_path).await
}

/// Initializer registered in the process-wide host for a logical name.
pub fn get_by_name(name: &str) -> Result<InitializerHandle> {
    global().initializer_by_name(name)
}

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{HostConfig, defaults, env_vars};
    pub use crate::plugin::{
        BindHandle, BindProvider, Capability, CapabilityHandle, CapabilitySet, Contract,
        Initializer, InitializerHandle, LoadedPlugin, MountHandle, MountProvider, PluginError,
        PluginHost, Result,
    };
}
