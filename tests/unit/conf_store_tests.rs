//! Unit tests for the tunnel configuration store.

use std::fs;

use tempfile::TempDir;

use wpdaemon::confs::ConfStore;

fn store_with(files: &[&str]) -> (TempDir, ConfStore) {
    let dir = TempDir::new().expect("tempdir");
    for name in files {
        fs::write(dir.path().join(name), "[Interface]\n").expect("write conf");
    }
    let store = ConfStore::new(dir.path().to_path_buf());
    (dir, store)
}

#[test]
fn normalize_appends_suffix() {
    assert_eq!(ConfStore::normalize_name("sweden"), "sweden.conf");
}

#[test]
fn normalize_is_idempotent() {
    assert_eq!(ConfStore::normalize_name("sweden.conf"), "sweden.conf");
}

#[test]
fn suffixed_and_bare_names_resolve_to_same_file() {
    let (_dir, store) = store_with(&["sweden.conf"]);
    assert_eq!(store.path_of("sweden"), store.path_of("sweden.conf"));
    assert!(store.exists("sweden"));
    assert!(store.exists("sweden.conf"));
}

#[test]
fn exists_is_false_for_missing_config() {
    let (_dir, store) = store_with(&[]);
    assert!(!store.exists("does-not-exist"));
}

#[test]
fn list_is_sorted_and_conf_only() {
    let (dir, store) = store_with(&["zurich.conf", "amsterdam.conf", "oslo.conf"]);
    fs::write(dir.path().join("notes.txt"), "not a config").expect("write");
    fs::create_dir(dir.path().join("nested.conf")).expect("mkdir");

    let names = store.list().expect("list");
    assert_eq!(names, vec!["amsterdam.conf", "oslo.conf", "zurich.conf"]);
}

#[test]
fn list_of_missing_directory_is_empty() {
    let dir = TempDir::new().expect("tempdir");
    let store = ConfStore::new(dir.path().join("nowhere"));
    assert_eq!(store.list().expect("list"), Vec::<String>::new());
}
