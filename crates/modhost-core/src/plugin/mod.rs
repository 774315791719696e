//! Plugin system for modhost.
//!
//! Plugins are dynamic libraries (.so, .dylib, .dll) exporting a single
//! [`modhost_sdk::PluginEntry`]. Loading a plugin goes through four steps:
//!
//! - **Loader**: open the library and resolve the entry symbol
//! - **Detector**: classify the entry against the capability contracts
//! - **Registries**: record one handle per satisfied capability, keyed by path
//! - **Activation**: call each satisfied capability once, in declaration order
//!
//! Handles are later retrieved by path or by logical name through
//! [`PluginHost`].

use std::path::PathBuf;

pub mod activation;
pub mod capability;
pub mod compile;
pub mod detector;
pub mod host;
pub mod loader;
pub mod registry;

// Re-exports
pub use activation::{ActivationFailure, Activator};
pub use capability::{
    BindHandle, BindProvider, Capability, CapabilityHandle, CapabilitySet, Contract,
    Initializer, InitializerHandle, MountHandle, MountProvider, RawHandle,
};
pub use compile::{CompileError, compile_plugin};
pub use detector::detect;
pub use host::{LoadedPlugin, PluginHost, is_plugin_library};
pub use loader::{DylibOpener, EntryObject, LoadedModule, ModuleOpener, StaticOpener};
pub use registry::{CapabilityRegistry, Registries};

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Plugin error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// The loadable unit could not be opened.
    #[error("Failed to open plugin {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    /// The unit opened but does not export the entry symbol.
    #[error("Plugin {} does not export symbol {symbol}", path.display())]
    MissingEntrySymbol { symbol: String, path: PathBuf },

    /// The entry was built against a different ABI.
    #[error("Plugin {} ABI mismatch: expected {expected}, found {found}", path.display())]
    AbiMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// Logical name does not resolve inside the plugin directory.
    #[error("Invalid plugin name: {0:?}")]
    InvalidName(String),

    /// No handle registered for this capability and path.
    #[error("Plugin {} not registered as {capability}", path.display())]
    NotFound {
        capability: Capability,
        path: PathBuf,
    },

    /// A capability's load-time operation failed.
    #[error("Plugin {} failed to activate {capability}: {failure}", path.display())]
    Activation {
        capability: Capability,
        path: PathBuf,
        failure: ActivationFailure,
    },

    /// The plugin directory could not be scanned.
    #[error("Failed to scan plugin directory {}: {reason}", path.display())]
    Discovery { path: PathBuf, reason: String },
}

impl PluginError {
    /// Path of the plugin the error refers to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Open { path, .. }
            | Self::MissingEntrySymbol { path, .. }
            | Self::AbiMismatch { path, .. }
            | Self::NotFound { path, .. }
            | Self::Activation { path, .. }
            | Self::Discovery { path, .. } => Some(path),
            Self::InvalidName(_) => None,
        }
    }
}
