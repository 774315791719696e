//! Plugin module loader.
//!
//! Opens a loadable unit by absolute path and resolves its entry symbol.
//! The loader performs no validation beyond what the loading primitive
//! reports and the entry's ABI version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use modhost_sdk::{ActivateFn, PLUGIN_ABI_VERSION, PLUGIN_ENTRY_SYMBOL, PluginEntry};

use super::capability::Capability;
use super::{PluginError, Result};

/// Entry object parsed from a module's [`PluginEntry`].
#[derive(Debug, Clone)]
pub struct EntryObject {
    name: Option<String>,
    init: Option<ActivateFn>,
    mount: Option<ActivateFn>,
    bind: Option<ActivateFn>,
}

impl EntryObject {
    /// Parse a raw plugin entry.
    ///
    /// # Safety
    /// `raw.name` must point to `raw.name_len` readable bytes and the
    /// function slots must point to code that outlives the returned value.
    pub unsafe fn from_raw(path: &Path, raw: &PluginEntry) -> Result<Self> {
        if raw.abi_version != PLUGIN_ABI_VERSION {
            return Err(PluginError::AbiMismatch {
                path: path.to_path_buf(),
                expected: PLUGIN_ABI_VERSION,
                found: raw.abi_version,
            });
        }

        Ok(Self {
            name: unsafe { raw.name() }.map(str::to_string),
            init: raw.init,
            mount: raw.mount,
            bind: raw.bind,
        })
    }

    /// Plugin display name, if the entry declares one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Function slot implementing `capability`.
    pub fn slot(&self, capability: Capability) -> Option<ActivateFn> {
        match capability {
            Capability::Initializer => self.init,
            Capability::MountProvider => self.mount,
            Capability::BindProvider => self.bind,
        }
    }
}

/// A module opened from one absolute path.
///
/// Never unloaded while any handle to it is alive.
#[derive(Debug)]
pub struct LoadedModule {
    path: PathBuf,
    entry: EntryObject,
    /// `None` for entries linked into the host binary
    _library: Option<Library>,
}

impl LoadedModule {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self) -> &EntryObject {
        &self.entry
    }

    /// Plugin name, falling back to the file name.
    pub fn name(&self) -> &str {
        self.entry
            .name()
            .or_else(|| self.path.file_name().and_then(|n| n.to_str()))
            .unwrap_or("unknown")
    }

    /// Whether the module was opened from a dynamic library.
    pub fn is_dynamic(&self) -> bool {
        self._library.is_some()
    }
}

/// Opens plugin modules.
pub trait ModuleOpener: Send + Sync {
    /// Open the unit at `path` and resolve its entry symbol.
    fn open(&self, path: &Path) -> Result<Arc<LoadedModule>>;
}

/// Opener for dynamic libraries, backed by `libloading`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DylibOpener;

impl ModuleOpener for DylibOpener {
    fn open(&self, path: &Path) -> Result<Arc<LoadedModule>> {
        tracing::debug!(path = %path.display(), "Opening plugin library");

        // SAFETY: loading runs the library's initializers; plugins are
        // trusted code built against modhost-sdk.
        let library = unsafe { Library::new(path) }.map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "Failed to open plugin library");
            PluginError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let missing_symbol = || PluginError::MissingEntrySymbol {
            symbol: PLUGIN_ENTRY_SYMBOL.to_string(),
            path: path.to_path_buf(),
        };

        // The symbol is a static, so the resolved address is a pointer to it.
        let raw: *const PluginEntry = unsafe {
            let symbol: Symbol<*const PluginEntry> = library
                .get(PLUGIN_ENTRY_SYMBOL.as_bytes())
                .map_err(|e| {
                    tracing::debug!(path = %path.display(), error = %e, "Entry symbol lookup failed");
                    missing_symbol()
                })?;
            *symbol
        };
        if raw.is_null() {
            return Err(missing_symbol());
        }

        // SAFETY: `raw` points into `library`, which is moved into the module
        // below and outlives the parsed entry.
        let entry = unsafe { EntryObject::from_raw(path, &*raw)? };
        tracing::debug!(
            path = %path.display(),
            name = entry.name().unwrap_or("-"),
            "Resolved plugin entry symbol"
        );

        Ok(Arc::new(LoadedModule {
            path: path.to_path_buf(),
            entry,
            _library: Some(library),
        }))
    }
}

/// Opener for entries linked into the host binary.
///
/// Maps absolute paths to static entries, so builtin plugins go through the
/// same detection, registration and activation as dynamic ones.
#[derive(Debug, Default)]
pub struct StaticOpener {
    modules: HashMap<PathBuf, Option<&'static PluginEntry>>,
}

impl StaticOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `entry` for `path`.
    pub fn with_entry(mut self, path: impl Into<PathBuf>, entry: &'static PluginEntry) -> Self {
        self.modules.insert(path.into(), Some(entry));
        self
    }

    /// Serve a module at `path` that exports no entry symbol.
    pub fn with_symbolless(mut self, path: impl Into<PathBuf>) -> Self {
        self.modules.insert(path.into(), None);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleOpener for StaticOpener {
    fn open(&self, path: &Path) -> Result<Arc<LoadedModule>> {
        let entry = match self.modules.get(path) {
            None => {
                return Err(PluginError::Open {
                    path: path.to_path_buf(),
                    reason: "no builtin module registered at this path".to_string(),
                });
            }
            Some(None) => {
                return Err(PluginError::MissingEntrySymbol {
                    symbol: PLUGIN_ENTRY_SYMBOL.to_string(),
                    path: path.to_path_buf(),
                });
            }
            Some(Some(entry)) => entry,
        };

        // SAFETY: static entries live for the whole process.
        let entry = unsafe { EntryObject::from_raw(path, entry)? };

        Ok(Arc::new(LoadedModule {
            path: path.to_path_buf(),
            entry,
            _library: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_sdk::STATUS_OK;

    unsafe extern "C" fn ok() -> i32 {
        STATUS_OK
    }

    static MOUNT_ONLY: PluginEntry = PluginEntry::new("mount-only").with_mount(ok);
    static NAMELESS: PluginEntry = PluginEntry::new("");
    static FUTURE_ABI: PluginEntry = PluginEntry::new("future").with_abi_version(99);

    #[test]
    fn test_entry_slots() {
        let entry = unsafe { EntryObject::from_raw(Path::new("/p/m.so"), &MOUNT_ONLY) }.unwrap();
        assert_eq!(entry.name(), Some("mount-only"));
        assert!(entry.slot(Capability::Initializer).is_none());
        assert!(entry.slot(Capability::MountProvider).is_some());
        assert!(entry.slot(Capability::BindProvider).is_none());
    }

    #[test]
    fn test_abi_mismatch() {
        let err = unsafe { EntryObject::from_raw(Path::new("/p/f.so"), &FUTURE_ABI) }.unwrap_err();
        assert_eq!(
            err,
            PluginError::AbiMismatch {
                path: PathBuf::from("/p/f.so"),
                expected: PLUGIN_ABI_VERSION,
                found: 99,
            }
        );
    }

    #[test]
    fn test_static_opener() {
        let opener = StaticOpener::new()
            .with_entry("/p/m.so", &MOUNT_ONLY)
            .with_symbolless("/p/empty.so");
        assert_eq!(opener.len(), 2);

        let module = opener.open(Path::new("/p/m.so")).unwrap();
        assert_eq!(module.path(), Path::new("/p/m.so"));
        assert_eq!(module.name(), "mount-only");
        assert!(!module.is_dynamic());

        assert!(matches!(
            opener.open(Path::new("/p/empty.so")),
            Err(PluginError::MissingEntrySymbol { .. })
        ));
        assert!(matches!(
            opener.open(Path::new("/p/other.so")),
            Err(PluginError::Open { .. })
        ));
    }

    #[test]
    fn test_name_falls_back_to_file_name() {
        let opener = StaticOpener::new().with_entry("/p/nameless.so", &NAMELESS);
        let module = opener.open(Path::new("/p/nameless.so")).unwrap();
        assert_eq!(module.name(), "nameless.so");
    }

    #[test]
    fn test_dylib_open_missing_file() {
        let err = DylibOpener
            .open(Path::new("/nonexistent/modhost/plugin.so"))
            .unwrap_err();
        match err {
            PluginError::Open { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/modhost/plugin.so"))
            }
            other => panic!("Expected Open error, got {other:?}"),
        }
    }
}
