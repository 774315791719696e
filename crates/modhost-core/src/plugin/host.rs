//! Plugin host: load, activate and look up plugins.
//!
//! Loading a path is deduplicated: concurrent callers share one in-flight
//! load, and loading an already loaded path returns the original result
//! without re-registering or re-activating anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::OnceCell;

use super::activation::Activator;
use super::capability::{Capability, CapabilitySet, Contract, Initializer, InitializerHandle, RawHandle};
use super::detector::detect;
use super::loader::{DylibOpener, LoadedModule, ModuleOpener};
use super::registry::Registries;
use super::{PluginError, Result};
use crate::config::HostConfig;

type LoadOutcome = Result<Arc<LoadedPlugin>>;

/// Report of a successful load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedPlugin {
    /// Absolute path of the module
    pub path: PathBuf,

    /// Plugin name
    pub name: String,

    /// Contracts the entry satisfies
    pub capabilities: Vec<Capability>,

    /// Contracts activated, in activation order
    pub activated: Vec<Capability>,

    /// When the plugin was loaded
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

impl LoadedPlugin {
    pub fn provides(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Loads plugins and owns the capability registries.
pub struct PluginHost {
    config: HostConfig,
    opener: Box<dyn ModuleOpener>,
    activator: Activator,
    registries: Registries,
    loaded: RwLock<HashMap<PathBuf, Arc<LoadedPlugin>>>,
    /// Every opened module by path; its code may still be referenced or running
    retained: Mutex<HashMap<PathBuf, Arc<LoadedModule>>>,
    inflight: Mutex<HashMap<PathBuf, Arc<OnceCell<LoadOutcome>>>>,
}

impl PluginHost {
    /// Host loading dynamic libraries.
    pub fn new(config: HostConfig) -> Self {
        Self::with_opener(config, DylibOpener)
    }

    /// Host loading modules through a custom opener.
    pub fn with_opener(config: HostConfig, opener: impl ModuleOpener + 'static) -> Self {
        let activator = Activator::new(config.activation_timeout());
        Self {
            config,
            opener: Box::new(opener),
            activator,
            registries: Registries::new(),
            loaded: RwLock::new(HashMap::new()),
            retained: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Absolute paths are kept, logical names go through the plugin directory.
    pub fn resolve(&self, name_or_path: &str) -> Result<PathBuf> {
        let path = Path::new(name_or_path);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            self.config.resolve(name_or_path)
        }
    }

    /// Load a plugin by logical name or absolute path.
    pub async fn load(&self, name_or_path: &str) -> Result<Arc<LoadedPlugin>> {
        let path = self.resolve(name_or_path)?;
        tracing::debug!(name = name_or_path, path = %path.display(), "Resolved plugin path");
        self.load_path(path).await
    }

    /// Load the plugin at an absolute path.
    pub async fn load_path(&self, path: impl Into<PathBuf>) -> Result<Arc<LoadedPlugin>> {
        let path = path.into();
        if let Some(plugin) = self.loaded.read().get(&path) {
            tracing::debug!(path = %path.display(), "Plugin already loaded");
            return Ok(plugin.clone());
        }

        let cell = self
            .inflight
            .lock()
            .entry(path.clone())
            .or_default()
            .clone();
        let outcome = cell.get_or_init(|| self.load_once(&path)).await.clone();

        let mut inflight = self.inflight.lock();
        if inflight.get(&path).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            inflight.remove(&path);
        }
        outcome
    }

    async fn load_once(&self, path: &Path) -> LoadOutcome {
        if let Some(plugin) = self.loaded.read().get(path) {
            return Ok(plugin.clone());
        }

        tracing::info!(path = %path.display(), "Loading plugin");
        let module = self.module(path).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Failed to load plugin");
        })?;

        let capabilities = detect(module.entry());
        if capabilities.is_empty() {
            tracing::debug!(path = %path.display(), "Plugin satisfies no capability contract");
        }

        // Registrations made by this load, undone unless the load completes.
        let mut registered = scopeguard::guard(Vec::new(), |registered: Vec<Capability>| {
            for capability in registered {
                self.registries.remove(capability, path);
            }
        });

        for capability in Capability::ALL {
            let Some(func) = module.entry().slot(capability) else {
                tracing::trace!(path = %path.display(), %capability, "Capability not provided");
                continue;
            };

            let handle = RawHandle::new(capability, module.clone(), func);
            self.registries.put(handle.clone());
            registered.push(capability);
            tracing::debug!(path = %path.display(), %capability, "Registered capability");

            if let Err(failure) = self.activator.activate(handle).await {
                tracing::error!(
                    path = %path.display(),
                    %capability,
                    error = %failure,
                    "Capability activation failed, rolling back plugin registrations"
                );
                return Err(PluginError::Activation {
                    capability,
                    path: path.to_path_buf(),
                    failure,
                });
            }
            tracing::debug!(path = %path.display(), %capability, "Activated capability");
        }

        let activated = scopeguard::ScopeGuard::into_inner(registered);
        let plugin = Arc::new(LoadedPlugin {
            path: path.to_path_buf(),
            name: module.name().to_string(),
            capabilities: capabilities.capabilities().collect(),
            activated,
            loaded_at: chrono::Utc::now(),
        });
        self.loaded.write().insert(path.to_path_buf(), plugin.clone());

        tracing::info!(
            path = %path.display(),
            name = %plugin.name,
            capabilities = ?plugin.capabilities,
            "Plugin loaded"
        );
        Ok(plugin)
    }

    /// Module opened for `path`, opening it on first use.
    ///
    /// A unit is opened at most once per host; later loads and inspections
    /// reuse the retained module.
    fn module(&self, path: &Path) -> Result<Arc<LoadedModule>> {
        if let Some(module) = self.retained.lock().get(path) {
            tracing::trace!(path = %path.display(), "Reusing retained plugin module");
            return Ok(module.clone());
        }

        let module = self.opener.open(path)?;
        Ok(self
            .retained
            .lock()
            .entry(path.to_path_buf())
            .or_insert(module)
            .clone())
    }

    /// Handle of contract `C` registered for an absolute path.
    pub fn get<C: Contract>(&self, path: &Path) -> Result<C::Handle> {
        self.registries.of::<C>().get(path)
    }

    /// Handle of contract `C` registered for a logical name.
    ///
    /// Never loads anything. `name` goes through the same resolution as
    /// [`load`](Self::load) minus the absolute-path shortcut: absolute names
    /// and names escaping the plugin directory fail with
    /// [`PluginError::InvalidName`], not `NotFound`. Use [`get`](Self::get)
    /// to look up an absolute path.
    pub fn get_by_name<C: Contract>(&self, name: &str) -> Result<C::Handle> {
        let path = self.config.resolve(name)?;
        self.get::<C>(&path)
    }

    /// Initializer handle registered for a logical name.
    ///
    /// Same name rules as [`get_by_name`](Self::get_by_name).
    pub fn initializer_by_name(&self, name: &str) -> Result<InitializerHandle> {
        self.get_by_name::<Initializer>(name)
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.loaded.read().contains_key(path)
    }

    /// Reports of all loaded plugins, sorted by path.
    pub fn loaded_plugins(&self) -> Vec<Arc<LoadedPlugin>> {
        let mut plugins: Vec<_> = self.loaded.read().values().cloned().collect();
        plugins.sort_by(|a, b| a.path.cmp(&b.path));
        plugins
    }

    /// Number of distinct modules opened by this host, including failed loads.
    pub fn retained_modules(&self) -> usize {
        self.retained.lock().len()
    }

    /// Load every plugin library in the plugin directory.
    ///
    /// One failing plugin does not stop the scan.
    pub async fn discover(&self) -> Result<Vec<(PathBuf, LoadOutcome)>> {
        let dir = self.config.plugin_dir();
        let entries = std::fs::read_dir(&dir).map_err(|e| PluginError::Discovery {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_plugin_library(path))
            .collect();
        paths.sort();

        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let outcome = self.load_path(path.clone()).await;
            outcomes.push((path, outcome));
        }
        tracing::info!(dir = %dir.display(), count = outcomes.len(), "Plugin discovery finished");
        Ok(outcomes)
    }

    /// Capabilities detected for `path` without activating anything.
    ///
    /// Opening the library still runs its own initializers. A module that
    /// is already open, loaded or not, is not opened again.
    pub fn inspect(&self, path: &Path) -> Result<CapabilitySet> {
        let module = self.module(path)?;
        Ok(detect(module.entry()))
    }
}

/// Check if a file is a dynamic library for the current platform.
pub fn is_plugin_library(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str());
    match std::env::consts::OS {
        "macos" => ext == Some("dylib"),
        "windows" => ext == Some("dll"),
        _ => ext == Some("so"),
    }
}
