use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::{fast_settings, init_tracing, mock_site, RecordingDiagnostics, RecordingReports};
use crate::config::Account;
use crate::driver::{AutomationDriver, ElementRef, ScriptArg, SessionFactory};
use crate::errors::{AutomationError, WorkflowError};
use crate::pacing::DelayRange;
use crate::runner::{RunSummary, Runner};
use crate::selector::Selector;
use crate::workflow::WorkflowState;

/// Crashes on first use.
struct PanickingDriver;

#[async_trait]
impl AutomationDriver for PanickingDriver {
    async fn navigate(&self, _url: &str) -> Result<(), AutomationError> {
        panic!("renderer crashed");
    }

    async fn find_all(&self, _selector: &Selector) -> Result<Vec<ElementRef>, AutomationError> {
        Ok(Vec::new())
    }

    async fn is_visible(&self, _element: &ElementRef) -> Result<bool, AutomationError> {
        Ok(false)
    }

    async fn click(&self, _element: &ElementRef) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn type_text(&self, _element: &ElementRef, _text: &str) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn execute_script(
        &self,
        _script: &str,
        _args: &[ScriptArg],
    ) -> Result<Value, AutomationError> {
        Ok(Value::Null)
    }

    async fn read_text(&self, _element: &ElementRef) -> Result<String, AutomationError> {
        Ok(String::new())
    }

    async fn current_document_text(&self) -> Result<String, AutomationError> {
        Ok(String::new())
    }

    async fn refresh(&self) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AutomationError> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        Ok(())
    }
}

/// Hands out a page per account; identifiers select the behavior.
#[derive(Default)]
struct ScriptedFactory {
    opened: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedFactory {
    fn opened(&self) -> Vec<(String, Instant)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self, account: &Account) -> Result<Box<dyn AutomationDriver>, AutomationError> {
        self.opened
            .lock()
            .unwrap()
            .push((account.identifier.clone(), Instant::now()));
        match account.identifier.split('@').next() {
            Some("nobrowser") => Err(AutomationError::PlatformError("chrome not found".into())),
            Some("crash") => Ok(Box::new(PanickingDriver)),
            _ => Ok(Box::new(mock_site(&["100", "150", "450"]))),
        }
    }
}

fn build_runner(
    factory: Arc<ScriptedFactory>,
    settings: crate::config::Settings,
) -> (Runner, Arc<RecordingReports>) {
    let reports = Arc::new(RecordingReports::default());
    let runner = Runner::new(factory, Arc::new(settings))
        .with_diagnostics(Arc::new(RecordingDiagnostics::default()))
        .with_report_sink(reports.clone());
    (runner, reports)
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_isolated_per_account() {
    init_tracing();
    let factory = Arc::new(ScriptedFactory::default());
    let (runner, reports) = build_runner(factory.clone(), fast_settings());
    let accounts = vec![
        Account::new("ok@example.com", "pw"),
        Account::new("nobrowser@example.com", "pw"),
        Account::new("crash@example.com", "pw"),
        Account::new("also-ok@example.com", "pw"),
    ];

    let results = runner.run(accounts).await;

    let ids: Vec<&str> = results.iter().map(|r| r.account_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "ok@example.com",
            "nobrowser@example.com",
            "crash@example.com",
            "also-ok@example.com"
        ]
    );
    assert_eq!(results[0].terminal_state, WorkflowState::Done);
    assert!(matches!(
        results[1].failure,
        Some(WorkflowError::SessionUnavailable(_))
    ));
    assert!(matches!(results[2].failure, Some(WorkflowError::Internal(_))));
    assert_eq!(results[3].terminal_state, WorkflowState::Done);
    assert_eq!(results[3].successful_shares, 10);

    assert_eq!(
        RunSummary::from_results(&results),
        RunSummary { done: 2, failed: 2 }
    );
    let account_reports = reports.accounts.lock().unwrap();
    assert_eq!(account_reports.len(), 4);
    assert!(account_reports
        .iter()
        .any(|r| r.account_id == "crash@example.com" && !r.succeeded));
}

#[tokio::test(start_paused = true)]
async fn test_starts_are_spaced_by_the_start_delay() {
    let factory = Arc::new(ScriptedFactory::default());
    let mut settings = fast_settings();
    settings.runner.workers = 3;
    settings.runner.start_delay = DelayRange::from_secs(5, 5);
    let (runner, _) = build_runner(factory.clone(), settings);
    let accounts = (0..3)
        .map(|i| Account::new(format!("user{i}@example.com"), "pw"))
        .collect();

    let results = runner.run(accounts).await;

    assert!(results.iter().all(|r| r.is_success()));
    let opened = factory.opened();
    assert_eq!(opened.len(), 3);
    let mut starts: Vec<Instant> = opened.iter().map(|(_, at)| *at).collect();
    starts.sort();
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(5));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_follows_all_but_the_last_account() {
    let mut settings = fast_settings();
    settings.runner.cooldown = DelayRange::from_secs(60, 60);
    let unavailable = |i: usize| Account::new(format!("nobrowser@example{i}.com"), "pw");

    let (single, _) = build_runner(Arc::new(ScriptedFactory::default()), settings.clone());
    let started = Instant::now();
    single.run(vec![unavailable(0)]).await;
    assert!(started.elapsed() < Duration::from_secs(60));

    let (pair, _) = build_runner(Arc::new(ScriptedFactory::default()), settings);
    let started = Instant::now();
    let results = pair.run(vec![unavailable(0), unavailable(1)]).await;
    assert_eq!(results.len(), 2);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(started.elapsed() < Duration::from_secs(120));
}
