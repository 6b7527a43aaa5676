//! Unit tests for managed-binary location and version probing.

use tempfile::TempDir;

use wpdaemon::binary::BinaryLocator;

#[test]
fn missing_binary_does_not_exist() {
    let dir = TempDir::new().expect("tempdir");
    let locator = BinaryLocator::new(dir.path().join("wireproxy").join("wireproxy"));
    assert!(!locator.exists());
}

#[tokio::test]
async fn version_of_missing_binary_degrades_gracefully() {
    let dir = TempDir::new().expect("tempdir");
    let locator = BinaryLocator::new(dir.path().join("wireproxy").join("wireproxy"));
    assert_eq!(locator.version().await, "Unknown (binary not found)");
}

#[cfg(unix)]
#[tokio::test]
async fn version_probe_captures_trimmed_stdout() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("wireproxy");
    std::fs::write(&path, "#!/bin/sh\necho \"wireproxy v1.0.9-test\"\n").expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let locator = BinaryLocator::new(path);
    assert_eq!(locator.version().await, "wireproxy v1.0.9-test");
}

#[cfg(unix)]
#[tokio::test]
async fn silent_binary_degrades_to_unknown() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("wireproxy");
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let locator = BinaryLocator::new(path);
    assert_eq!(locator.version().await, "Unknown (failed to run)");
}
