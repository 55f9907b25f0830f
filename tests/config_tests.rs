//! Integration tests for layered configuration loading.

use std::fs;

use idch::test_support::EnvGuard;
use idch::{ConfigError, IdchConfig, Location};
use rstest::rstest;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> String {
    let path = dir.path().join("idch.toml");
    fs::write(&path, body).expect("write config");
    path.to_str().expect("utf-8 temp path").to_owned()
}

#[tokio::test]
async fn environment_supplies_values_over_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(&dir, "");
    let _guard = EnvGuard::apply(&[
        ("IDCH_CONFIG_PATH", Some(path.as_str())),
        ("IDCH_API_KEY", Some("env-key")),
        ("IDCH_PAGE_SIZE", Some("25")),
        ("IDCH_DEFAULT_LOCATION", Some("sgp01")),
        ("IDCH_BASE_URL", None),
        ("IDCH_TIMEOUT_SECS", None),
    ])
    .await;

    let config = IdchConfig::load_without_cli_args().expect("load config");

    assert_eq!(config.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.page_size, 25);
    assert_eq!(config.base_url, "https://api.idcloudhost.com/v1");
    assert_eq!(config.timeout_secs, 360);
    assert_eq!(config.location(), Ok(Some(Location::Sgp01)));
    config.validate().expect("valid config");
}

#[tokio::test]
async fn file_values_are_overridden_by_environment() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(
        &dir,
        "api_key = \"file-key\"\ntimeout_secs = 30\npage_size = 40\ndefault_location = \"jkt02\"\n",
    );
    let _guard = EnvGuard::apply(&[
        ("IDCH_CONFIG_PATH", Some(path.as_str())),
        ("IDCH_API_KEY", Some("env-key")),
        ("IDCH_TIMEOUT_SECS", Some("45")),
        ("IDCH_PAGE_SIZE", None),
        ("IDCH_DEFAULT_LOCATION", None),
    ])
    .await;

    let config = IdchConfig::load_without_cli_args().expect("load config");

    assert_eq!(config.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.timeout_secs, 45);
    assert_eq!(config.page_size, 40);
    assert_eq!(config.location(), Ok(Some(Location::Jkt02)));
}

#[rstest]
#[case::missing_key(None, "IDCH_API_KEY")]
#[case::blank_key(Some("  "), "IDCH_API_KEY")]
fn validation_names_the_key_source(#[case] api_key: Option<&str>, #[case] env_var: &str) {
    let config = IdchConfig {
        api_key: api_key.map(str::to_owned),
        base_url: String::from("https://api.idcloudhost.com/v1"),
        default_location: None,
        timeout_secs: 360,
        page_size: 100,
    };

    let err = config.validate().expect_err("api key is required");

    let ConfigError::MissingField(ref message) = err else {
        panic!("expected MissingField, got {err:?}");
    };
    assert!(message.contains(env_var), "{message}");
    assert!(message.contains("idch.toml"), "{message}");
    assert!(message.contains("api_key"), "{message}");
}

#[test]
fn unknown_default_location_is_invalid() {
    let config = IdchConfig {
        api_key: Some(String::from("key")),
        base_url: String::from("https://api.idcloudhost.com/v1"),
        default_location: Some(String::from("ams01")),
        timeout_secs: 360,
        page_size: 100,
    };

    let err = config.validate().expect_err("location is unknown");

    assert!(matches!(
        err,
        ConfigError::Invalid(ref message) if message.contains("IDCH_DEFAULT_LOCATION")
    ));
}
