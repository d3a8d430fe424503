//! Smoke tests for basic functionality

use piggykv::{Key, KvClient, KvDevice, TransferConfig};

#[test]
fn test_version_exists() {
    // Verify the crate version string is valid semver
    let version = env!("CARGO_PKG_VERSION");
    assert!(!version.is_empty());
    let parts: Vec<&str> = version.split('.').collect();
    assert_eq!(parts.len(), 3, "Version should be semver: {version}");
}

#[test]
fn test_put_get_smoke() {
    let client = KvClient::new(KvDevice::in_memory(), TransferConfig::default()).unwrap();
    client.put(Key::from(1), b"smoke").unwrap();
    assert_eq!(client.get(Key::from(1)).unwrap().unwrap(), b"smoke");
}

#[test]
fn test_default_config_is_usable() {
    let config = TransferConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.adaptive_threshold, 127);
    assert_eq!(config.page_size, 4096);
}
