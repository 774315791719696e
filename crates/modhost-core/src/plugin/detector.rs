//! Capability detection.

use super::capability::{Capability, CapabilitySet};
use super::loader::EntryObject;

/// Classify `entry` against every capability contract.
///
/// Pure: only inspects which function slots are present.
pub fn detect(entry: &EntryObject) -> CapabilitySet {
    Capability::ALL
        .into_iter()
        .filter(|capability| entry.slot(*capability).is_some())
        .fold(CapabilitySet::empty(), |set, capability| {
            set | capability.flag()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_sdk::{PluginEntry, STATUS_OK};
    use std::path::Path;

    unsafe extern "C" fn ok() -> i32 {
        STATUS_OK
    }

    fn parse(entry: &'static PluginEntry) -> EntryObject {
        unsafe { EntryObject::from_raw(Path::new("/p/test.so"), entry) }.unwrap()
    }

    static NONE: PluginEntry = PluginEntry::new("none");
    static INIT: PluginEntry = PluginEntry::new("init").with_init(ok);
    static INIT_MOUNT: PluginEntry = PluginEntry::new("echo").with_init(ok).with_mount(ok);
    static BIND: PluginEntry = PluginEntry::new("bind").with_bind(ok);
    static ALL: PluginEntry = PluginEntry::new("all")
        .with_init(ok)
        .with_mount(ok)
        .with_bind(ok);

    #[test]
    fn test_detect_none() {
        assert!(detect(&parse(&NONE)).is_empty());
    }

    #[test]
    fn test_detect_independent_contracts() {
        assert_eq!(detect(&parse(&INIT)), CapabilitySet::INITIALIZER);
        assert_eq!(detect(&parse(&BIND)), CapabilitySet::BIND_PROVIDER);
        assert_eq!(
            detect(&parse(&INIT_MOUNT)),
            CapabilitySet::INITIALIZER | CapabilitySet::MOUNT_PROVIDER
        );
        assert_eq!(detect(&parse(&ALL)), CapabilitySet::all());
    }

    #[test]
    fn test_detect_is_repeatable() {
        let entry = parse(&INIT_MOUNT);
        assert_eq!(detect(&entry), detect(&entry));
    }
}
