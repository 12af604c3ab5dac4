mod helpers;

use clap::Parser;
use destctl::cli::Cli;
use destctl::config::{Config, EvictionOrder};
use destctl::core::DestinationType;
use helpers::test_utils::temp_file;
use serial_test::serial;

fn load(args: &[&str]) -> Config {
    let cli = Cli::try_parse_from(args).unwrap();
    Config::load(&cli).unwrap()
}

#[test]
#[serial]
fn test_defaults_without_file() {
    let config = load(&["destctl", "types"]);
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        [dispatch]
        default_timeout_ms = 5000
        allowed_types = ["chat", "email"]
        [http]
        connect_timeout_ms = 1000
        request_timeout_ms = 4000
        user_agent = "alerting/2.0"
        [cache]
        enabled = true
        max_capacity = 32
        ttl_seconds = 600
        idle_seconds = 120
        eviction = "tiny_lfu"
        [email.credentials.ops]
        username = "relay-user"
        password = "relay-pass"
    "#;
    let (_file, path) = temp_file(toml_content, ".toml");

    let config = load(&["destctl", "--config", path.to_str().unwrap(), "types"]);

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.dispatch.default_timeout_ms, 5000);
    assert_eq!(
        config.dispatch.allowed_types,
        Some(vec![DestinationType::Chat, DestinationType::Email])
    );
    assert_eq!(config.http.connect_timeout_ms, 1000);
    assert_eq!(config.http.request_timeout_ms, 4000);
    assert_eq!(config.http.user_agent, "alerting/2.0");
    assert_eq!(config.cache.max_capacity, 32);
    assert_eq!(config.cache.ttl_seconds, Some(600));
    assert_eq!(config.cache.idle_seconds, Some(120));
    assert_eq!(config.cache.eviction, EvictionOrder::TinyLfu);
    assert_eq!(config.email.credentials["ops"].username, "relay-user");
}

#[test]
#[serial]
fn test_partial_file_keeps_other_defaults() {
    let (_file, path) = temp_file("[dispatch]\ndefault_timeout_ms = 750\n", ".toml");

    let config = load(&["destctl", "--config", path.to_str().unwrap(), "types"]);

    assert_eq!(config.dispatch.default_timeout_ms, 750);
    assert_eq!(config.cache, Config::default().cache);
    assert_eq!(config.http, Config::default().http);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let (_file, path) = temp_file("log_level = \"warn\"\n[dispatch]\ndefault_timeout_ms = 750\n", ".toml");
    std::env::set_var("DESTCTL_DISPATCH__DEFAULT_TIMEOUT_MS", "1234");

    let config = load(&["destctl", "--config", path.to_str().unwrap(), "types"]);
    std::env::remove_var("DESTCTL_DISPATCH__DEFAULT_TIMEOUT_MS");

    assert_eq!(config.dispatch.default_timeout_ms, 1234);
    assert_eq!(config.log_level, "warn");
}

#[test]
#[serial]
fn test_cli_overrides_environment_and_file() {
    let (_file, path) = temp_file("log_level = \"warn\"\n[cache]\nenabled = true\nmax_capacity = 8\n", ".toml");
    std::env::set_var("DESTCTL_DISPATCH__DEFAULT_TIMEOUT_MS", "1234");

    let config = load(&[
        "destctl",
        "--config",
        path.to_str().unwrap(),
        "--timeout-ms",
        "99",
        "--log-level",
        "trace",
        "--no-client-cache",
        "types",
    ]);
    std::env::remove_var("DESTCTL_DISPATCH__DEFAULT_TIMEOUT_MS");

    assert_eq!(config.dispatch.default_timeout_ms, 99);
    assert_eq!(config.log_level, "trace");
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.max_capacity, 8);
}

#[test]
#[serial]
fn test_unknown_destination_type_is_rejected() {
    let (_file, path) = temp_file("[dispatch]\nallowed_types = [\"pager\"]\n", ".toml");
    let cli = Cli::try_parse_from(["destctl", "--config", path.to_str().unwrap(), "types"]).unwrap();

    assert!(Config::load(&cli).is_err());
}
