//! Plugin Discovery Tests
//!
//! Scans real plugin directories:
//! - Only platform libraries are considered
//! - A failing library does not stop the scan
//! - Missing directories are reported

use std::env::consts::DLL_SUFFIX;
use std::path::Path;

use modhost_core::HostConfig;
use modhost_core::plugin::{Capability, PluginError, PluginHost, StaticOpener};
use modhost_sdk::{PluginEntry, STATUS_OK};

fn config(libexec: &Path) -> HostConfig {
    HostConfig {
        libexec_dir: libexec.to_path_buf(),
        ..HostConfig::default()
    }
}

unsafe extern "C" fn ok() -> i32 {
    STATUS_OK
}

static DISCOVERED: PluginEntry = PluginEntry::new("discovered").with_mount(ok);

#[tokio::test]
async fn test_discover_loads_libraries_in_order() {
    let temp = tempfile::tempdir().unwrap();
    let config = config(temp.path());
    let plugin_dir = config.plugin_dir();
    std::fs::create_dir_all(&plugin_dir).unwrap();

    let good = plugin_dir.join(format!("a_discovered{DLL_SUFFIX}"));
    let stray = plugin_dir.join(format!("b_stray{DLL_SUFFIX}"));
    std::fs::write(&good, b"").unwrap();
    std::fs::write(&stray, b"").unwrap();
    std::fs::write(plugin_dir.join("README.txt"), b"not a plugin").unwrap();

    let host = PluginHost::with_opener(config, StaticOpener::new().with_entry(good.clone(), &DISCOVERED));
    let outcomes = host.discover().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].0, good);
    assert!(outcomes[0].1.is_ok());
    assert_eq!(outcomes[1].0, stray);
    assert!(matches!(outcomes[1].1, Err(PluginError::Open { .. })));

    assert_eq!(host.registries().count(Capability::MountProvider), 1);
    assert_eq!(host.loaded_plugins().len(), 1);
}

#[tokio::test]
async fn test_discover_invalid_library() {
    let temp = tempfile::tempdir().unwrap();
    let config = config(temp.path());
    let plugin_dir = config.plugin_dir();
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::write(
        plugin_dir.join(format!("garbage{DLL_SUFFIX}")),
        b"this is not a shared object",
    )
    .unwrap();

    let host = PluginHost::new(config);
    let outcomes = host.discover().await.unwrap();

    assert_eq!(outcomes.len(), 1);
    match &outcomes[0].1 {
        Err(PluginError::Open { reason, .. }) => assert!(!reason.is_empty()),
        other => panic!("Expected Open error, got {other:?}"),
    }
    for capability in Capability::ALL {
        assert_eq!(host.registries().count(capability), 0);
    }
}

#[tokio::test]
async fn test_discover_missing_directory() {
    let temp = tempfile::tempdir().unwrap();
    let host = PluginHost::new(config(&temp.path().join("absent")));

    assert!(matches!(
        host.discover().await,
        Err(PluginError::Discovery { .. })
    ));
}

#[tokio::test]
async fn test_global_host_lookup() {
    assert!(matches!(
        modhost_core::get_by_name("never-loaded.so"),
        Err(PluginError::NotFound { .. })
    ));
    assert!(matches!(
        modhost_core::load("../escape.so").await,
        Err(PluginError::InvalidName(_))
    ));
}
