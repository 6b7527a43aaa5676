//! Unit tests for the per-session log file.
//!
//! Validates header and footer blocks, handle duplication, idempotent
//! finalization, and path retention after close.

use std::fs;
use std::io::Write;

use tempfile::TempDir;

use wpdaemon::supervisor::session_log::SessionLog;

const RULE: &str =
    "================================================================================";

fn session_log(dir: &TempDir) -> SessionLog {
    SessionLog::new(
        dir.path().join("wp-server-logs"),
        dir.path().join("wireproxy_confs"),
    )
}

fn logs_ready(dir: &TempDir) -> SessionLog {
    fs::create_dir_all(dir.path().join("wp-server-logs")).expect("mkdir");
    session_log(dir)
}

#[test]
fn create_writes_header_block() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);

    let path = log.create("sweden.conf", "wireproxy v1.0.9").expect("create");
    let contents = fs::read_to_string(&path).expect("read log");

    assert!(contents.starts_with(&format!("{RULE}\nWireProxy Server Log\n{RULE}\n")));
    assert!(contents.contains("Start Time: "));
    assert!(contents.contains("Unix Timestamp: "));
    assert!(contents.contains("Configuration: sweden.conf\n"));
    assert!(contents.contains("WireProxy Version: wireproxy v1.0.9\n"));
    assert!(contents.contains("Configuration File: "));
    assert!(contents.contains("sweden.conf\n"));
    assert!(contents.ends_with(&format!("\nProcess Output:\n{RULE}\n")));
}

#[test]
fn log_file_name_carries_timestamp_and_config_stem() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);

    let path = log.create("sweden.conf", "v1").expect("create");
    let name = path.file_name().and_then(|n| n.to_str()).expect("name");

    let (stamp, rest) = name.split_once('_').expect("underscore separator");
    assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(rest, "sweden.log");
}

#[test]
fn finalize_appends_footer_and_closes() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);

    let path = log.create("c.conf", "v1").expect("create");
    assert!(log.is_open());

    log.finalize("Graceful termination");
    assert!(!log.is_open());

    let contents = fs::read_to_string(&path).expect("read log");
    assert!(contents.contains(&format!("\n{RULE}\nWireProxy Server Teardown\n{RULE}\n")));
    assert!(contents.contains("Stop Time: "));
    assert!(contents.contains("Status: Initiating shutdown\n"));
    assert!(contents.contains("Shutdown Method: Graceful termination\n"));
    assert!(contents.contains("Final Status: Process terminated\n"));
    assert!(contents.ends_with(&format!("End of log\n{RULE}\n")));
}

#[test]
fn finalize_without_open_log_is_a_no_op() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);

    log.finalize("nothing open");
    assert!(!log.is_open());
    assert_eq!(log.current_path(), std::path::PathBuf::new());
}

#[test]
fn finalize_is_idempotent() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);

    let path = log.create("c.conf", "v1").expect("create");
    log.finalize("Graceful termination");
    log.finalize("second call must not append");

    let contents = fs::read_to_string(&path).expect("read log");
    assert_eq!(contents.matches("WireProxy Server Teardown").count(), 1);
    assert!(!contents.contains("second call must not append"));
}

#[test]
fn current_path_survives_finalize() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);

    let path = log.create("c.conf", "v1").expect("create");
    log.finalize("done");
    assert_eq!(log.current_path(), path);
}

#[test]
fn handle_fails_without_open_log() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);
    assert!(log.handle().is_err());
}

#[test]
fn handle_writes_land_between_header_and_footer() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);

    let path = log.create("c.conf", "v1").expect("create");
    let mut handle = log.handle().expect("handle");
    writeln!(handle, "tunnel output line").expect("write through handle");
    drop(handle);
    log.finalize("done");

    let contents = fs::read_to_string(&path).expect("read log");
    let output_pos = contents.find("tunnel output line").expect("child output");
    let header_pos = contents.find("Process Output:").expect("header");
    let footer_pos = contents.find("WireProxy Server Teardown").expect("footer");
    assert!(header_pos < output_pos && output_pos < footer_pos);
}

#[test]
fn create_fails_when_directory_is_missing() {
    let dir = TempDir::new().expect("tempdir");
    let log = session_log(&dir); // wp-server-logs never created
    assert!(log.create("c.conf", "v1").is_err());
}

#[test]
fn create_replaces_previously_open_log() {
    let dir = TempDir::new().expect("tempdir");
    let log = logs_ready(&dir);

    let first = log.create("a.conf", "v1").expect("create a");
    let second = log.create("b.conf", "v1").expect("create b");
    assert_ne!(first, second);
    assert_eq!(log.current_path(), second);
}
