//! modhost plugin SDK
//!
//! The ABI shared between the modhost host and the plugins it loads.
//!
//! A plugin is a `cdylib` exporting one [`PluginEntry`] under
//! [`PLUGIN_ENTRY_SYMBOL`]. Each capability the plugin provides is a non-null
//! function slot in that entry; the host calls every present slot once when
//! the library is loaded.
//!
//! # Quick Start
//!
//! ```rust
//! use modhost_sdk::STATUS_OK;
//!
//! extern "C" fn init() -> i32 {
//!     STATUS_OK
//! }
//!
//! extern "C" fn mount() -> i32 {
//!     STATUS_OK
//! }
//!
//! modhost_sdk::declare_plugin! {
//!     name: "echo",
//!     init: init,
//!     mount: mount,
//! }
//! ```

pub mod entry;
#[macro_use]
pub mod macros;

pub use entry::{ActivateFn, PLUGIN_ABI_VERSION, PLUGIN_ENTRY_SYMBOL, PluginEntry, STATUS_OK};
