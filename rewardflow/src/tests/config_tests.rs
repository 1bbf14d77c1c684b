use std::io::Write;
use tempfile::NamedTempFile;

use crate::config::{
    load_accounts_from_env, load_accounts_from_file, load_accounts_from_str, Account, ConfigError,
    Settings,
};
use crate::share::Channel;

#[test]
fn test_single_account_object() {
    let accounts = load_accounts_from_str(r#"{"username": "a@example.com", "password": "pw"}"#).unwrap();
    assert_eq!(accounts, vec![Account::new("a@example.com", "pw")]);
}

#[test]
fn test_account_array_keeps_order() {
    let accounts = load_accounts_from_str(
        r#"[
            {"username": "first@example.com", "password": "one"},
            {"username": "second@example.com", "password": "two"}
        ]"#,
    )
    .unwrap();
    let ids: Vec<&str> = accounts.iter().map(|a| a.identifier.as_str()).collect();
    assert_eq!(ids, vec!["first@example.com", "second@example.com"]);
}

#[test]
fn test_empty_array_is_rejected() {
    assert_eq!(load_accounts_from_str("[]"), Err(ConfigError::EmptyAccounts));
}

#[test]
fn test_blank_source_is_missing() {
    assert!(matches!(
        load_accounts_from_str("  \n"),
        Err(ConfigError::MissingAccounts(_))
    ));
}

#[test]
fn test_malformed_accounts_are_rejected() {
    for input in [
        "not json",
        r#"{"username": "a@example.com"}"#,
        r#"[{"user": "a", "pass": "b"}]"#,
        r#""a@example.com""#,
    ] {
        assert!(
            matches!(load_accounts_from_str(input), Err(ConfigError::InvalidAccounts(_))),
            "{input} should be invalid"
        );
    }
}

#[test]
fn test_empty_credentials_are_rejected() {
    let err = load_accounts_from_str(r#"[{"username": "a@example.com", "password": ""}]"#).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidAccounts(ref m) if m.contains("a@example.com")));
    let err = load_accounts_from_str(r#"{"username": " ", "password": "pw"}"#).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidAccounts(_)));
}

#[test]
fn test_debug_output_redacts_secret() {
    let account = Account::new("a@example.com", "s3cret-value");
    let debug = format!("{account:?}");
    assert!(debug.contains("a@example.com"));
    assert!(!debug.contains("s3cret-value"));
}

#[test]
fn test_unset_environment_variable() {
    let err = load_accounts_from_env("REWARDFLOW_TEST_ACCOUNTS_NEVER_SET").unwrap_err();
    assert!(matches!(err, ConfigError::MissingAccounts(ref m) if m.contains("NEVER_SET")));
}

#[test]
fn test_accounts_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"[{{"username": "f@example.com", "password": "pw"}}]"#).unwrap();
    let accounts = load_accounts_from_file(file.path()).unwrap();
    assert_eq!(accounts[0].identifier, "f@example.com");

    let missing = load_accounts_from_file(&file.path().with_extension("missing")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));
}

#[test]
fn test_yaml_settings_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "site:\n  base_url: https://rewards.test\nshare:\n  quota: 4\nrunner:\n  workers: 2\n  start_delay: {{ min_ms: 0, max_ms: 10 }}\n"
    )
    .unwrap();

    let settings = Settings::from_file(file.path()).unwrap();

    assert_eq!(settings.site.base_url, "https://rewards.test");
    assert_eq!(settings.share.quota, 4);
    assert_eq!(settings.share.open_attempts, 5);
    assert_eq!(settings.runner.workers, 2);
    assert_eq!(settings.runner.start_delay.max_ms, 10);
    assert_eq!(settings.site.news_ready_marker, "Weekly News Highlights");
    assert_eq!(settings.site.channels.len(), Channel::ALL.len());
    settings.validate().unwrap();
}

#[test]
fn test_json_settings_with_custom_locators() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
            "site": {{
                "base_url": "http://localhost:8080",
                "locators": {{
                    "check_in_button": {{ "name": "check_in_button", "candidates": ["css:#claim", "text:Check In"] }}
                }},
                "channels": [
                    {{ "channel": "Twitter", "candidates": {{ "name": "Twitter", "candidates": ["css:.tw"] }} }}
                ]
            }},
            "reconcile": {{ "max_polls": 6 }}
        }}"#
    )
    .unwrap();

    let settings = Settings::from_file(file.path()).unwrap();

    assert_eq!(settings.site.locators.check_in_button.len(), 2);
    assert_eq!(settings.site.channels.len(), 1);
    assert_eq!(settings.site.channels[0].channel, Channel::Twitter);
    assert_eq!(settings.reconcile.max_polls, 6);
    assert_eq!(settings.reconcile.poll_delay_ms, 5_000);
    settings.validate().unwrap();
}

#[test]
fn test_unparsable_settings_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(matches!(
        Settings::from_file(file.path()),
        Err(ConfigError::InvalidSettings(_))
    ));
}

#[test]
fn test_validate_rejects_bad_settings() {
    let valid = || {
        let mut settings = Settings::default();
        settings.site.base_url = "https://rewards.test".to_string();
        settings
    };
    valid().validate().unwrap();

    assert!(Settings::default().validate().is_err(), "base_url is required");

    let mut settings = valid();
    settings.site.base_url = "rewards.test".to_string();
    assert!(settings.validate().is_err());

    let mut settings = valid();
    settings.share.quota = 0;
    assert!(settings.validate().is_err());

    let mut settings = valid();
    settings.site.channels.clear();
    assert!(settings.validate().is_err());

    let mut settings = valid();
    settings.runner.workers = 0;
    assert!(settings.validate().is_err());

    let mut settings = valid();
    settings.click_retry.max_attempts = 0;
    assert!(matches!(settings.validate(), Err(ConfigError::InvalidSettings(_))));
}
