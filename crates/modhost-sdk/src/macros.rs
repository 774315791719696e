//! Declarative macros for plugin development.

/// Export the plugin entry symbol.
///
/// Capability slots are optional but must appear in the order
/// `init`, `mount`, `bind`.
///
/// # Example
///
/// ```rust
/// use modhost_sdk::STATUS_OK;
///
/// extern "C" fn my_init() -> i32 {
///     STATUS_OK
/// }
///
/// modhost_sdk::declare_plugin! {
///     name: "my-plugin",
///     init: my_init,
/// }
/// ```
#[macro_export]
macro_rules! declare_plugin {
    (
        name: $name:expr
        $(, init: $init:expr)?
        $(, mount: $mount:expr)?
        $(, bind: $bind:expr)?
        $(,)?
    ) => {
        /// Plugin entry looked up by the host.
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static modhost_plugin_entry: $crate::PluginEntry = $crate::PluginEntry::new($name)
            $(.with_init($init))?
            $(.with_mount($mount))?
            $(.with_bind($bind))?;
    };
}
