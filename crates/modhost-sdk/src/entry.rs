//! Plugin entry definition.
//!
//! Every plugin library exports exactly one [`PluginEntry`] under the symbol
//! [`PLUGIN_ENTRY_SYMBOL`]. The host inspects the optional function slots to
//! decide which capabilities the plugin provides.

/// Plugin ABI version (must match the host).
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Name of the symbol every plugin library must export.
pub const PLUGIN_ENTRY_SYMBOL: &str = "modhost_plugin_entry";

/// Status returned by an activation function on success.
pub const STATUS_OK: i32 = 0;

/// Load-time operation of one capability.
///
/// Returns [`STATUS_OK`] on success, any other value is reported to the host
/// as an activation failure code.
pub type ActivateFn = unsafe extern "C" fn() -> i32;

/// C-compatible plugin entry.
///
/// A `None` slot means the plugin does not provide that capability.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PluginEntry {
    /// ABI version - must match PLUGIN_ABI_VERSION
    pub abi_version: u32,

    /// Plugin display name (UTF-8, not null-terminated)
    pub name: *const u8,
    pub name_len: usize,

    /// Initializer capability
    pub init: Option<ActivateFn>,

    /// Mount provider capability
    pub mount: Option<ActivateFn>,

    /// Bind provider capability
    pub bind: Option<ActivateFn>,
}

// SAFETY: the entry only points at immutable static data owned by the
// plugin library for as long as the library stays loaded.
unsafe impl Sync for PluginEntry {}
unsafe impl Send for PluginEntry {}

impl PluginEntry {
    /// Create an entry without any capability.
    pub const fn new(name: &'static str) -> Self {
        Self {
            abi_version: PLUGIN_ABI_VERSION,
            name: name.as_ptr(),
            name_len: name.len(),
            init: None,
            mount: None,
            bind: None,
        }
    }

    /// Provide the initializer capability.
    pub const fn with_init(self, init: ActivateFn) -> Self {
        Self {
            init: Some(init),
            ..self
        }
    }

    /// Provide the mount capability.
    pub const fn with_mount(self, mount: ActivateFn) -> Self {
        Self {
            mount: Some(mount),
            ..self
        }
    }

    /// Provide the bind capability.
    pub const fn with_bind(self, bind: ActivateFn) -> Self {
        Self {
            bind: Some(bind),
            ..self
        }
    }

    /// Override the ABI version. Only useful to exercise host-side checks.
    pub const fn with_abi_version(self, abi_version: u32) -> Self {
        Self {
            abi_version,
            ..self
        }
    }

    /// Read the plugin name.
    ///
    /// Returns `None` when the name is missing or not valid UTF-8.
    ///
    /// # Safety
    /// `name` must point to `name_len` readable bytes.
    pub unsafe fn name(&self) -> Option<&str> {
        if self.name.is_null() || self.name_len == 0 {
            return None;
        }
        // SAFETY: guaranteed by the caller.
        let bytes = unsafe { std::slice::from_raw_parts(self.name, self.name_len) };
        std::str::from_utf8(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn noop() -> i32 {
        STATUS_OK
    }

    #[test]
    fn test_entry_defaults() {
        let entry = PluginEntry::new("plain");
        assert_eq!(entry.abi_version, PLUGIN_ABI_VERSION);
        assert!(entry.init.is_none());
        assert!(entry.mount.is_none());
        assert!(entry.bind.is_none());
        assert_eq!(unsafe { entry.name() }, Some("plain"));
    }

    #[test]
    fn test_entry_builder() {
        let entry = PluginEntry::new("full")
            .with_init(noop)
            .with_mount(noop)
            .with_bind(noop);

        assert!(entry.init.is_some());
        assert!(entry.mount.is_some());
        assert!(entry.bind.is_some());
    }

    #[test]
    fn test_entry_empty_name() {
        let entry = PluginEntry::new("");
        assert_eq!(unsafe { entry.name() }, None);
    }
}
