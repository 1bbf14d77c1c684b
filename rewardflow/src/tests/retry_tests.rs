use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{session_with_diagnostics, Effect, MockElement, MockPage, RecordingDiagnostics, ACCOUNT};
use crate::errors::AutomationError;
use crate::interaction::ClickMethod;
use crate::locator::LocatorCandidateSet;
use crate::retry::{ActionOutcome, RetryPolicy, RetryingActionExecutor};
use crate::site::SiteLocators;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_secs(5), Duration::from_secs(2))
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_action_is_exhausted_after_max_attempts() {
    let page = MockPage::new();
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let session = session_with_diagnostics(&page, diagnostics.clone());
    let dialogs = SiteLocators::default().dialog_close;
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let outcome: ActionOutcome<()> = RetryingActionExecutor::new(&session, &dialogs, policy(3))
        .execute_with_retry("check_in", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AutomationError::ElementNotFound("check in".into())) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        outcome,
        ActionOutcome::Exhausted {
            attempts: 3,
            last_error: Some(AutomationError::ElementNotFound("check in".into())),
        }
    );
    // Two waits of base + U[0, jitter)
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(14), "{elapsed:?}");
    assert_eq!(
        diagnostics.labels(),
        vec![
            format!("{ACCOUNT}_check_in_attempt1"),
            format!("{ACCOUNT}_check_in_attempt2"),
            format!("{ACCOUNT}_check_in_attempt3"),
        ]
    );
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delay_between_attempts_stays_in_jitter_window() {
    let page = MockPage::new();
    let session = super::session_for(&page);
    let dialogs = SiteLocators::default().dialog_close;
    let mut stamps = Vec::new();

    let _: ActionOutcome<()> = RetryingActionExecutor::new(&session, &dialogs, policy(4))
        .execute_with_retry("flaky", |_| {
            stamps.push(Instant::now());
            async { Err(AutomationError::Timeout("flaky".into())) }
        })
        .await;

    assert_eq!(stamps.len(), 4);
    for pair in stamps.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(5), "{gap:?}");
        assert!(gap < Duration::from_secs(7), "{gap:?}");
    }
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_success_on_second_attempt() {
    let page = MockPage::new();
    let session = super::session_for(&page);
    let dialogs = SiteLocators::default().dialog_close;

    let outcome = RetryingActionExecutor::new(&session, &dialogs, policy(3))
        .execute_with_retry("login", |attempt| async move {
            if attempt < 2 {
                Err(AutomationError::ElementObscured("login".into()))
            } else {
                Ok(attempt * 10)
            }
        })
        .await;

    assert_eq!(
        outcome,
        ActionOutcome::Success {
            value: 20,
            attempts: 2
        }
    );
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_each_attempt_dismisses_dialogs_first() {
    let page = MockPage::new().with(
        MockElement::new("promo", ["css:svg.icon.close-img"]).on_click(Effect::Hide("promo")),
    );
    let session = super::session_for(&page);
    let dialogs = SiteLocators::default().dialog_close;
    let watcher = page.clone();

    let outcome = RetryingActionExecutor::new(&session, &dialogs, policy(1))
        .execute_with_retry("submit", |_| {
            let dialog_gone = !watcher.is_shown("promo");
            async move {
                if dialog_gone {
                    Ok(())
                } else {
                    Err(AutomationError::ElementObscured("promo".into()))
                }
            }
        })
        .await;

    assert!(outcome.is_success());
    assert_eq!(page.clicks(), vec!["promo"]);
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_click_target_falls_back_to_script_click() {
    let page = MockPage::new().with(MockElement::new("check_in", ["css:div.centerBtn"]).reject_native_clicks(1));
    let session = super::session_for(&page);
    let dialogs = SiteLocators::default().dialog_close;
    let target = LocatorCandidateSet::single("check_in", "css:div.centerBtn");

    let outcome = RetryingActionExecutor::new(&session, &dialogs, policy(3))
        .click_target(&target)
        .await;

    assert_eq!(
        outcome,
        ActionOutcome::Success {
            value: ClickMethod::Scripted,
            attempts: 1
        }
    );
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_click_target_retries_when_both_clicks_fail() {
    let page = MockPage::new().with(
        MockElement::new("check_in", ["css:div.centerBtn"])
            .reject_native_clicks(2)
            .reject_script_clicks(1),
    );
    let session = super::session_for(&page);
    let dialogs = SiteLocators::default().dialog_close;
    let target = LocatorCandidateSet::single("check_in", "css:div.centerBtn");

    let outcome = RetryingActionExecutor::new(&session, &dialogs, policy(3))
        .with_element_timeout(Duration::from_secs(1))
        .click_target(&target)
        .await;

    assert_eq!(outcome.attempts(), 2);
    assert_eq!(outcome.value(), Some(ClickMethod::Scripted));
    session.close().await.unwrap();
}

#[test]
fn test_delay_after_grows_with_multiplier() {
    let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::ZERO).with_multiplier(2.0);
    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(policy.delay_after(1, &mut rng), Duration::from_secs(1));
    assert_eq!(policy.delay_after(2, &mut rng), Duration::from_secs(2));
    assert_eq!(policy.delay_after(3, &mut rng), Duration::from_secs(4));
}

#[test]
fn test_delay_after_jitter_bounds() {
    let policy = RetryPolicy::default();
    let mut rng = StdRng::seed_from_u64(42);
    for attempt in 1..=20 {
        let delay = policy.delay_after(attempt, &mut rng);
        assert!(delay >= Duration::from_secs(5));
        assert!(delay < Duration::from_secs(7));
    }
}

#[test]
fn test_exhausted_message_names_last_error() {
    let outcome: ActionOutcome<()> = ActionOutcome::Exhausted {
        attempts: 3,
        last_error: Some(AutomationError::Timeout("login".into())),
    };
    assert_eq!(
        outcome.error_message(),
        "gave up after 3 attempts: Operation timed out: login"
    );
}
