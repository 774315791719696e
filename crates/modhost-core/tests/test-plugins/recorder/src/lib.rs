//! Test plugin recording the order of its activations.
//!
//! Every call appends one decimal digit to `CALLS`: `1` for init, `2` for
//! mount. `recorder_calls` exposes the sequence to the test.

use std::sync::atomic::{AtomicU32, Ordering};

use modhost_sdk::STATUS_OK;

static CALLS: AtomicU32 = AtomicU32::new(0);

fn record(step: u32) {
    let _ = CALLS.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |calls| {
        Some(calls * 10 + step)
    });
}

extern "C" fn recorder_init() -> i32 {
    record(1);
    STATUS_OK
}

extern "C" fn recorder_mount() -> i32 {
    // Mount depends on state set up by init.
    if CALLS.load(Ordering::SeqCst) % 10 != 1 {
        return 3;
    }
    record(2);
    STATUS_OK
}

#[no_mangle]
pub extern "C" fn recorder_calls() -> u32 {
    CALLS.load(Ordering::SeqCst)
}

modhost_sdk::declare_plugin! {
    name: "recorder",
    init: recorder_init,
    mount: recorder_mount,
}
