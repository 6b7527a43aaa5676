//! End-to-end watchdog trip: a child that floods its log with
//! unreachable-network errors is auto-terminated, and the next `state`
//! records the drop in the log footer.

use std::time::Duration;

use serde_json::{json, Value};

use super::test_helpers::{
    install_binary, send_command, start_daemon, test_base, wait_for_running, write_conf,
    NOISY_BINARY,
};

#[tokio::test]
async fn sustained_network_errors_terminate_the_tunnel() {
    let (base, config) = test_base();
    install_binary(&config, NOISY_BINARY);
    write_conf(&config, "c.conf");
    let daemon = start_daemon(base, config).await;

    let up = send_command(daemon.addr, "spin_up:c\n").await;
    assert_eq!(up["error"], Value::Null, "unexpected reply: {up}");
    let log_file = up["result"]["log_file"].as_str().expect("log path").to_owned();

    // The stand-in prints five matching lines about a second in; the
    // watchdog should SIGTERM the group and the next probes observe death.
    wait_for_running(daemon.addr, false, Duration::from_secs(15)).await;

    let contents = std::fs::read_to_string(&log_file).expect("read log");
    assert!(
        contents.contains("Shutdown Method: Network drop detected - auto-terminated"),
        "footer must record the network drop; log was:\n{contents}"
    );
    assert!(contents.contains("End of log"));

    // The supervisor is idle again and accepts a fresh session.
    let state = send_command(daemon.addr, "state:\n").await;
    assert_eq!(state["result"]["running"], json!(false));
    assert_eq!(state["result"]["log_file"], json!(log_file));
}
