use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::dialog::DialogDismisser;
use crate::errors::AutomationError;
use crate::interaction::{ActionExecutor, ClickMethod};
use crate::locator::{LocatorCandidateSet, LocatorResolver};
use crate::session::Session;

/// Bounded attempts with a base delay, optional exponential growth and uniform jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Upper (exclusive) bound of the random addition to every delay.
    pub jitter_ms: u64,
    /// Growth of the base delay per attempt; 1.0 keeps it fixed.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 5_000,
            jitter_ms: 2_000,
            multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            jitter_ms: jitter.as_millis() as u64,
            multiplier: 1.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay after the failed `attempt` (1-based): `base * multiplier^(attempt-1) + U[0, jitter)`.
    pub fn delay_after<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let growth = self
            .multiplier
            .max(1.0)
            .powi(attempt.saturating_sub(1) as i32);
        let scaled = (self.base_delay_ms as f64 * growth).min(u64::MAX as f64 / 2.0) as u64;
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..self.jitter_ms)
        };
        Duration::from_millis(scaled.saturating_add(jitter))
    }
}

/// Result of [`RetryingActionExecutor::execute_with_retry`]. Exhaustion is an
/// ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T> {
    Success { value: T, attempts: u32 },
    Exhausted {
        attempts: u32,
        last_error: Option<AutomationError>,
    },
}

impl<T> ActionOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ActionOutcome::Success { attempts, .. } | ActionOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            ActionOutcome::Success { value, .. } => Some(value),
            ActionOutcome::Exhausted { .. } => None,
        }
    }

    pub fn error_message(&self) -> String {
        match self {
            ActionOutcome::Success { .. } => String::new(),
            ActionOutcome::Exhausted {
                attempts,
                last_error: Some(e),
            } => format!("gave up after {attempts} attempts: {e}"),
            ActionOutcome::Exhausted { attempts, .. } => format!("gave up after {attempts} attempts"),
        }
    }
}

/// Runs one UI action with dialog precondition, diagnostics and jittered backoff.
pub struct RetryingActionExecutor<'a> {
    session: &'a Session,
    dialogs: &'a LocatorCandidateSet,
    policy: RetryPolicy,
    element_timeout: Duration,
}

impl<'a> RetryingActionExecutor<'a> {
    pub fn new(session: &'a Session, dialogs: &'a LocatorCandidateSet, policy: RetryPolicy) -> Self {
        Self {
            session,
            dialogs,
            policy,
            element_timeout: Duration::from_secs(20),
        }
    }

    /// How long each attempt of [`click_target`](Self::click_target) waits for its element.
    pub fn with_element_timeout(mut self, element_timeout: Duration) -> Self {
        self.element_timeout = element_timeout;
        self
    }

    /// Run `action` until it succeeds or `max_attempts` are spent.
    ///
    /// Every attempt first dismisses any dialog that appeared since the last one.
    /// Failed attempts capture diagnostics under `label`.
    #[instrument(level = "debug", skip(self, action))]
    pub async fn execute_with_retry<T, F, Fut>(&self, label: &str, mut action: F) -> ActionOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AutomationError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            DialogDismisser::new(self.session.driver(), self.dialogs)
                .dismiss_if_present()
                .await;

            match action(attempt).await {
                Ok(value) => {
                    return ActionOutcome::Success {
                        value,
                        attempts: attempt,
                    }
                }
                Err(e) => {
                    warn!(label, attempt, max_attempts, error = %e, "Action attempt failed");
                    self.session
                        .capture_diagnostics(&format!("{label}_attempt{attempt}"))
                        .await;
                    last_error = Some(e);
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.delay_after(attempt, &mut rand::thread_rng());
                tokio::time::sleep(delay).await;
            }
        }

        ActionOutcome::Exhausted {
            attempts: max_attempts,
            last_error,
        }
    }

    /// Resolve `target`, scroll it into view and click it, with retries.
    pub async fn click_target(&self, target: &LocatorCandidateSet) -> ActionOutcome<ClickMethod> {
        let session = self.session;
        let timeout = self.element_timeout;
        let outcome = self
            .execute_with_retry(&target.name, |_| async move {
                let driver = session.driver();
                let found = LocatorResolver::new(driver).resolve(target, timeout).await?;
                ActionExecutor::new(driver)
                    .scroll_and_click(&found.element, &session.pacing().action)
                    .await
            })
            .await;

        if let ActionOutcome::Success { value, attempts } = &outcome {
            info!(locator = %target.name, method = ?value, attempts, "Clicked");
            session.pause(&session.pacing().action).await;
        }
        outcome
    }
}
