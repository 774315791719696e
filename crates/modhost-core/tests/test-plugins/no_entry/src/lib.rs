//! Test library that is a valid cdylib but exports no plugin entry.

#[no_mangle]
pub extern "C" fn no_entry_answer() -> i32 {
    42
}
