//! Capability registries.
//!
//! One path-keyed map per capability contract. Entries are written during a
//! successful load and are never removed through the public API.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::capability::{
    BindHandle, BindProvider, Capability, CapabilityHandle, Contract, Initializer,
    InitializerHandle, MountHandle, MountProvider, RawHandle,
};
use super::{PluginError, Result};

/// Registry of one capability contract.
#[derive(Debug)]
pub struct CapabilityRegistry<H> {
    capability: Capability,
    entries: RwLock<HashMap<PathBuf, H>>,
}

impl<H: CapabilityHandle> CapabilityRegistry<H> {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Insert or overwrite the handle for `path`. Returns the previous one.
    pub fn put(&self, path: PathBuf, handle: H) -> Option<H> {
        self.entries.write().insert(path, handle)
    }

    /// Get the handle registered for `path`.
    pub fn get(&self, path: &Path) -> Result<H> {
        self.entries
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| PluginError::NotFound {
                capability: self.capability,
                path: path.to_path_buf(),
            })
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.entries.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub(crate) fn remove(&self, path: &Path) -> Option<H> {
        self.entries.write().remove(path)
    }
}

/// The registries of all capability contracts.
#[derive(Debug)]
pub struct Registries {
    pub(crate) initializers: CapabilityRegistry<InitializerHandle>,
    pub(crate) mounts: CapabilityRegistry<MountHandle>,
    pub(crate) binds: CapabilityRegistry<BindHandle>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            initializers: CapabilityRegistry::new(Capability::Initializer),
            mounts: CapabilityRegistry::new(Capability::MountProvider),
            binds: CapabilityRegistry::new(Capability::BindProvider),
        }
    }

    /// Registry of contract `C`.
    pub fn of<C: Contract>(&self) -> &CapabilityRegistry<C::Handle> {
        C::registry(self)
    }

    /// Register a raw handle in the registry of its capability.
    pub fn put(&self, handle: RawHandle) {
        let path = handle.path().to_path_buf();
        match handle.capability() {
            Capability::Initializer => {
                self.initializers.put(path, Initializer::wrap(handle));
            }
            Capability::MountProvider => {
                self.mounts.put(path, MountProvider::wrap(handle));
            }
            Capability::BindProvider => {
                self.binds.put(path, BindProvider::wrap(handle));
            }
        }
    }

    pub fn contains(&self, capability: Capability, path: &Path) -> bool {
        match capability {
            Capability::Initializer => self.initializers.contains(path),
            Capability::MountProvider => self.mounts.contains(path),
            Capability::BindProvider => self.binds.contains(path),
        }
    }

    /// Number of entries in the registry of `capability`.
    pub fn count(&self, capability: Capability) -> usize {
        match capability {
            Capability::Initializer => self.initializers.len(),
            Capability::MountProvider => self.mounts.len(),
            Capability::BindProvider => self.binds.len(),
        }
    }

    /// Capabilities registered for `path`, in declaration order.
    pub fn capabilities_of(&self, path: &Path) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| self.contains(*capability, path))
            .collect()
    }

    pub(crate) fn remove(&self, capability: Capability, path: &Path) {
        match capability {
            Capability::Initializer => {
                self.initializers.remove(path);
            }
            Capability::MountProvider => {
                self.mounts.remove(path);
            }
            Capability::BindProvider => {
                self.binds.remove(path);
            }
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::loader::{ModuleOpener, StaticOpener};
    use modhost_sdk::{PluginEntry, STATUS_OK};

    unsafe extern "C" fn ok() -> i32 {
        STATUS_OK
    }

    static ECHO: PluginEntry = PluginEntry::new("echo").with_init(ok).with_mount(ok);

    fn raw(capability: Capability, path: &str) -> RawHandle {
        let module = StaticOpener::new()
            .with_entry(path, &ECHO)
            .open(Path::new(path))
            .unwrap();
        let func = module.entry().slot(capability).unwrap();
        RawHandle::new(capability, module, func)
    }

    #[test]
    fn test_registries_start_empty() {
        let registries = Registries::new();
        for capability in Capability::ALL {
            assert_eq!(registries.count(capability), 0);
        }
        assert!(registries.of::<Initializer>().is_empty());
    }

    #[test]
    fn test_put_and_get() {
        let registries = Registries::new();
        registries.put(raw(Capability::Initializer, "/p/echo.so"));

        let handle = registries
            .of::<Initializer>()
            .get(Path::new("/p/echo.so"))
            .unwrap();
        assert_eq!(handle.path(), Path::new("/p/echo.so"));
        assert_eq!(
            registries.capabilities_of(Path::new("/p/echo.so")),
            vec![Capability::Initializer]
        );
    }

    #[test]
    fn test_get_missing() {
        let registries = Registries::new();
        let err = registries
            .of::<MountProvider>()
            .get(Path::new("/p/none.so"))
            .unwrap_err();
        assert_eq!(
            err,
            PluginError::NotFound {
                capability: Capability::MountProvider,
                path: PathBuf::from("/p/none.so"),
            }
        );
    }

    #[test]
    fn test_put_overwrites() {
        let registry = CapabilityRegistry::<MountHandle>::new(Capability::MountProvider);
        let first = MountProvider::wrap(raw(Capability::MountProvider, "/p/echo.so"));
        let second = MountProvider::wrap(raw(Capability::MountProvider, "/p/echo.so"));

        assert!(registry.put(PathBuf::from("/p/echo.so"), first).is_none());
        assert!(registry.put(PathBuf::from("/p/echo.so"), second).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.paths(), vec![PathBuf::from("/p/echo.so")]);
    }

    #[test]
    fn test_remove() {
        let registries = Registries::new();
        registries.put(raw(Capability::MountProvider, "/p/echo.so"));
        registries.remove(Capability::MountProvider, Path::new("/p/echo.so"));
        assert!(!registries.contains(Capability::MountProvider, Path::new("/p/echo.so")));
    }
}
