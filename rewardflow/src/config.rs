//! Account source and run settings. Everything here is checked before a
//! browser is started: a bad configuration aborts the whole run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::pacing::{DelayRange, PacingPolicy};
use crate::points::ReconcilePolicy;
use crate::retry::RetryPolicy;
use crate::site::SiteProfile;

/// Environment variable holding the account list as JSON.
pub const ACCOUNTS_ENV: &str = "REWARDFLOW_ACCOUNTS";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No accounts configured: {0}")]
    MissingAccounts(String),

    #[error("Invalid account configuration: {0}")]
    InvalidAccounts(String),

    #[error("Account list is empty")]
    EmptyAccounts,

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
}

/// Credentials for one account. Immutable once loaded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "username", alias = "identifier")]
    pub identifier: String,
    #[serde(rename = "password", alias = "secret")]
    pub secret: String,
}

impl Account {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccountSource {
    One(Account),
    Many(Vec<Account>),
}

/// Parse a single account object or an array of them.
pub fn load_accounts_from_str(json: &str) -> Result<Vec<Account>, ConfigError> {
    if json.trim().is_empty() {
        return Err(ConfigError::MissingAccounts("account source is blank".to_string()));
    }
    let source: AccountSource = serde_json::from_str(json).map_err(|e| {
        ConfigError::InvalidAccounts(format!(
            "expected a {{\"username\", \"password\"}} object or an array of them: {e}"
        ))
    })?;
    let accounts = match source {
        AccountSource::One(account) => vec![account],
        AccountSource::Many(accounts) => accounts,
    };
    if accounts.is_empty() {
        return Err(ConfigError::EmptyAccounts);
    }
    for (index, account) in accounts.iter().enumerate() {
        if account.identifier.trim().is_empty() {
            return Err(ConfigError::InvalidAccounts(format!(
                "account #{index} has an empty username"
            )));
        }
        if account.secret.is_empty() {
            return Err(ConfigError::InvalidAccounts(format!(
                "account '{}' has an empty password",
                account.identifier
            )));
        }
    }
    Ok(accounts)
}

pub fn load_accounts_from_env(var: &str) -> Result<Vec<Account>, ConfigError> {
    let value = std::env::var(var)
        .map_err(|_| ConfigError::MissingAccounts(format!("environment variable {var} is not set")))?;
    load_accounts_from_str(&value)
}

pub fn load_accounts_from_file(path: &Path) -> Result<Vec<Account>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    load_accounts_from_str(&content)
}

/// Element and page wait limits, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Waiting for a control to become visible, per attempt.
    pub element_ms: u64,
    /// Waiting for the authenticated marker after submitting credentials.
    pub auth_ms: u64,
    /// Waiting for a page-ready text marker.
    pub marker_ms: u64,
    /// Waiting for the points display on a single read.
    pub points_read_ms: u64,
    /// Waiting for a share channel control or the share trigger.
    pub share_control_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_ms: 20_000,
            auth_ms: 10_000,
            marker_ms: 10_000,
            points_read_ms: 10_000,
            share_control_ms: 5_000,
        }
    }
}

impl Timeouts {
    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    pub fn auth(&self) -> Duration {
        Duration::from_millis(self.auth_ms)
    }

    pub fn marker(&self) -> Duration {
        Duration::from_millis(self.marker_ms)
    }

    pub fn points_read(&self) -> Duration {
        Duration::from_millis(self.points_read_ms)
    }

    pub fn share_control(&self) -> Duration {
        Duration::from_millis(self.share_control_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSettings {
    /// Share attempts per campaign, successful or not.
    pub quota: u32,
    /// Tries to open the share surface, refreshing in between.
    pub open_attempts: u32,
    /// Overall "open surface then run campaign" rounds.
    pub rounds: u32,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            quota: 10,
            open_attempts: 5,
            rounds: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Accounts processed in parallel, each with its own browser.
    pub workers: usize,
    /// Random delay between account starts.
    pub start_delay: DelayRange,
    /// Random pause after each account finishes.
    pub cooldown: DelayRange,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            start_delay: DelayRange::from_secs(10, 20),
            cooldown: DelayRange::from_secs(5, 10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site: SiteProfile,
    /// Clicks on workflow controls (sign-in, submit, check-in).
    pub click_retry: RetryPolicy,
    /// Waits for form inputs.
    pub wait_retry: RetryPolicy,
    pub pacing: PacingPolicy,
    pub timeouts: Timeouts,
    pub share: ShareSettings,
    pub reconcile: ReconcilePolicy,
    /// Where failure screenshots and page sources go. `None` disables them.
    pub diagnostics_dir: Option<PathBuf>,
    pub runner: RunnerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site: SiteProfile::default(),
            click_retry: RetryPolicy::default(),
            wait_retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(2)),
            pacing: PacingPolicy::default(),
            timeouts: Timeouts::default(),
            share: ShareSettings::default(),
            reconcile: ReconcilePolicy::default(),
            diagnostics_dir: None,
            runner: RunnerSettings::default(),
        }
    }
}

impl Settings {
    /// Load from a `.json`, `.yaml` or `.yml` file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content)
                .map_err(|e| ConfigError::InvalidSettings(format!("{}: {e}", path.display())))
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::InvalidSettings(format!("{}: {e}", path.display())))
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.site.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidSettings(
                "site.base_url is required".to_string(),
            ));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidSettings(format!(
                "site.base_url must be an http(s) URL, got '{base}'"
            )));
        }
        if self.share.quota == 0 {
            return Err(ConfigError::InvalidSettings(
                "share.quota must be at least 1".to_string(),
            ));
        }
        if self.site.channels.is_empty() {
            return Err(ConfigError::InvalidSettings(
                "site.channels must list at least one channel".to_string(),
            ));
        }
        if self.runner.workers == 0 {
            return Err(ConfigError::InvalidSettings(
                "runner.workers must be at least 1".to_string(),
            ));
        }
        if self.click_retry.max_attempts == 0 || self.wait_retry.max_attempts == 0 {
            return Err(ConfigError::InvalidSettings(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
