//! Configuration loading tests.
//!
//! Tests that touch `JUNOS_*` variables run serially.

use std::io::Write;
use std::time::Duration;

use junos_txn::config::DeviceConfig;
use pretty_assertions::assert_eq;
use serial_test::serial;
use tempfile::{Builder, NamedTempFile};

const ENV_VARS: &[&str] = &[
    "JUNOS_HOST",
    "JUNOS_PORT",
    "JUNOS_USERNAME",
    "JUNOS_PASSWORD",
    "JUNOS_SSH_KEY_FILE",
    "JUNOS_SSH_KEY_PEM",
    "JUNOS_KEYPASS",
    "JUNOS_SLEEP_SHORT",
    "JUNOS_SLEEP_SSH_CLOSED",
    "JUNOS_COMMAND_TIMEOUT",
    "JUNOS_TXN_CONFIG",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
#[serial]
fn test_load_toml_config() {
    clear_env();
    let file = config_file(
        ".toml",
        r#"
host = "edge-fw1.example.net"
port = 2830
username = "automation"
password = "secret"
command_timeout = 45
sleep_short = 250
"#,
    );

    let config = DeviceConfig::load(Some(&file.path().to_path_buf())).unwrap();
    assert_eq!(config.host, "edge-fw1.example.net");
    assert_eq!(config.port, 2830);
    assert_eq!(config.username, "automation");
    assert_eq!(config.password.as_deref(), Some("secret"));
    assert_eq!(config.target(), "edge-fw1.example.net:2830");

    let options = config.session_options();
    assert_eq!(options.command_timeout, Some(Duration::from_secs(45)));
    assert_eq!(options.sleep_short, Duration::from_millis(250));
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_load_yaml_config() {
    clear_env();
    let file = config_file(
        ".yaml",
        r#"
host: core-sw1
ssh_key_file: /home/automation/.ssh/id_ed25519
use_agent: false
offer_base_1_1: true
"#,
    );

    let config = DeviceConfig::load(Some(&file.path().to_path_buf())).unwrap();
    assert_eq!(config.host, "core-sw1");
    assert_eq!(config.port, 830);
    assert!(!config.use_agent);
    assert!(config.offer_base_1_1);
    assert!(config.ssh_key_file.is_some());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_load_json_config() {
    clear_env();
    let file = config_file(
        ".json",
        r#"{"host": "10.0.0.1", "username": "ops", "sleep_ssh_closed": 500}"#,
    );

    let config = DeviceConfig::load(Some(&file.path().to_path_buf())).unwrap();
    assert_eq!(config.host, "10.0.0.1");
    assert_eq!(config.username, "ops");
    assert_eq!(
        config.session_options().sleep_ssh_closed,
        Duration::from_millis(500)
    );
}

#[test]
#[serial]
fn test_invalid_file_is_an_error() {
    clear_env();
    let file = config_file(".json", "{ not json");
    assert!(DeviceConfig::load(Some(&file.path().to_path_buf())).is_err());
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("junos-txn.toml");

    let err = DeviceConfig::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
#[serial]
fn test_file_without_switches_keeps_defaults() {
    clear_env();
    let file = config_file(".toml", "host = \"r1\"\n");

    let config = DeviceConfig::load(Some(&file.path().to_path_buf())).unwrap();
    assert!(config.use_agent);
    assert!(config.accept_unknown_hosts);
    assert!(!config.offer_base_1_1);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = config_file(".toml", "host = \"from-file\"\nport = 2830\n");

    std::env::set_var("JUNOS_HOST", "from-env");
    std::env::set_var("JUNOS_COMMAND_TIMEOUT", "7");
    std::env::set_var("JUNOS_PORT", "not-a-port");

    let config = DeviceConfig::load(Some(&file.path().to_path_buf())).unwrap();
    clear_env();

    assert_eq!(config.host, "from-env");
    assert_eq!(config.port, 2830);
    assert_eq!(config.command_timeout, Some(7));
}

#[test]
#[serial]
fn test_env_only_config() {
    clear_env();
    std::env::set_var("JUNOS_HOST", "r1");
    std::env::set_var("JUNOS_USERNAME", "lab");
    std::env::set_var("JUNOS_SLEEP_SHORT", "0");

    let mut config = DeviceConfig::default();
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.host, "r1");
    assert_eq!(config.username, "lab");
    assert_eq!(config.sleep_short, 0);
}

#[test]
fn test_missing_host_fails_validation() {
    let err = DeviceConfig::default().validate().unwrap_err();
    assert!(err.to_string().contains("host must be set"));
}
