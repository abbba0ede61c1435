//! Tests for the TOML game manifest.

use std::io::Write;
use tempfile::NamedTempFile;
use turnstile_host::HostConfig;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_missing_file_uses_defaults() {
    let config = HostConfig::load_or_default("/nonexistent/turnstile.toml").expect("Defaults");
    assert_eq!(*config.min_players(), 1);
    assert_eq!(*config.max_players(), 10);
    assert_eq!(config.host_user(), "0");
    assert_eq!(config.users().len(), 10);
    assert!(*config.require_ready());
    assert!(!*config.auto_start());
}

#[test]
fn test_partial_file_fills_defaults() {
    let file = write_config(
        r#"
        min_players = 2
        max_players = 4
        default_players = 3
        auto_start = true
        "#,
    );
    let config = HostConfig::from_file(file.path()).expect("Config loads");
    assert_eq!(*config.min_players(), 2);
    assert_eq!(config.initial_seat_count(), 3);
    assert!(*config.auto_start());
    assert!(*config.auto_switch());
    assert_eq!(config.colors().len(), 10);
}

#[test]
fn test_invalid_bounds_are_rejected() {
    let file = write_config("min_players = 5\nmax_players = 2\n");
    let err = HostConfig::from_file(file.path()).unwrap_err();
    assert!(err.message.contains("Invalid player bounds"));
}

#[test]
fn test_host_must_be_on_roster() {
    let file = write_config(
        r#"
        host_user = "admin"

        [[users]]
        id = "p1"
        name = "Player One"
        "#,
    );
    assert!(HostConfig::from_file(file.path()).is_err());
}

#[test]
fn test_seat_count_is_clamped() {
    let config = HostConfig::with_players(2, 4);
    assert_eq!(config.initial_seat_count(), 2);
}
