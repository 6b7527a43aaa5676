//! Unit tests for error display.
//!
//! Protocol-visible variants must render their payload verbatim — these
//! strings travel on the wire in the reply's `error` field.

use wpdaemon::DaemonError;

#[test]
fn protocol_variants_render_payload_verbatim() {
    let cases: [(DaemonError, &str); 6] = [
        (
            DaemonError::NotRunning("WireProxy is not running".into()),
            "WireProxy is not running",
        ),
        (
            DaemonError::AlreadyRunning("WireProxy is already running with config: c.conf".into()),
            "WireProxy is already running with config: c.conf",
        ),
        (
            DaemonError::ConfigNotFound("Configuration not found: x.conf".into()),
            "Configuration not found: x.conf",
        ),
        (
            DaemonError::Parse("Parsing error: colon not found".into()),
            "Parsing error: colon not found",
        ),
        (
            DaemonError::Transition("Failed to transition to STARTING state".into()),
            "Failed to transition to STARTING state",
        ),
        (
            DaemonError::Spawn("Failed to spawn WireProxy process".into()),
            "Failed to spawn WireProxy process",
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn ambient_variants_carry_a_prefix() {
    assert_eq!(
        DaemonError::Config("port already bound".into()).to_string(),
        "config: port already bound"
    );
    assert_eq!(
        DaemonError::Io("disk full".into()).to_string(),
        "io: disk full"
    );
}

#[test]
fn io_errors_convert() {
    let err: DaemonError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, DaemonError::Io(_)));
}

#[test]
fn toml_errors_convert_to_config() {
    let parse_err = toml::from_str::<toml::Value>("not [ valid").unwrap_err();
    let err: DaemonError = parse_err.into();
    assert!(matches!(err, DaemonError::Config(_)));
}
