//! Echo plugin for modhost.
//!
//! Satisfies the Initializer and MountProvider contracts. Build and load it:
//!
//! ```bash
//! modhost plugin compile demos/echo-plugin -o /usr/local/libexec/modhost/lib/plugins/echo.so
//! modhost plugin load echo.so
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use modhost_sdk::STATUS_OK;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Status returned when `mount` runs before `init`.
const STATUS_NOT_INITIALIZED: i32 = 1;

extern "C" fn echo_init() -> i32 {
    INITIALIZED.store(true, Ordering::SeqCst);
    eprintln!("[echo] initialized");
    STATUS_OK
}

extern "C" fn echo_mount() -> i32 {
    if !INITIALIZED.load(Ordering::SeqCst) {
        return STATUS_NOT_INITIALIZED;
    }
    eprintln!("[echo] mount handler installed");
    STATUS_OK
}

modhost_sdk::declare_plugin! {
    name: "echo",
    init: echo_init,
    mount: echo_mount,
}
