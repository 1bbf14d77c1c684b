//! Runs every account through its own workflow and browser session.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::{Account, Settings};
use crate::diagnostics::{DiagnosticSink, FileDiagnosticSink, NullDiagnosticSink};
use crate::driver::SessionFactory;
use crate::errors::WorkflowError;
use crate::report::{AccountReport, ReportSink, StdoutReportSink};
use crate::session::Session;
use crate::workflow::{WorkflowOrchestrator, WorkflowResult};

/// Per-run tally of account outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_results(results: &[WorkflowResult]) -> Self {
        let done = results.iter().filter(|r| r.is_success()).count();
        Self {
            done,
            failed: results.len() - done,
        }
    }

    pub fn total(&self) -> usize {
        self.done + self.failed
    }
}

/// Multi-account scheduler.
///
/// Accounts run on at most `runner.workers` parallel workers. Starts are
/// spaced by a random delay, and one account's failure or panic never
/// affects the others.
pub struct Runner {
    factory: Arc<dyn SessionFactory>,
    settings: Arc<Settings>,
    diagnostics: Arc<dyn DiagnosticSink>,
    reports: Arc<dyn ReportSink>,
}

impl Runner {
    pub fn new(factory: Arc<dyn SessionFactory>, settings: Arc<Settings>) -> Self {
        let diagnostics: Arc<dyn DiagnosticSink> = match &settings.diagnostics_dir {
            Some(dir) => Arc::new(FileDiagnosticSink::new(dir.clone())),
            None => Arc::new(NullDiagnosticSink),
        };
        Self {
            factory,
            settings,
            diagnostics,
            reports: Arc::new(StdoutReportSink),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_report_sink(mut self, reports: Arc<dyn ReportSink>) -> Self {
        self.reports = reports;
        self
    }

    /// One result per account, in input order.
    pub async fn run(&self, accounts: Vec<Account>) -> Vec<WorkflowResult> {
        let total = accounts.len();
        let workers = self.settings.runner.workers.max(1);
        info!(accounts = total, workers, "Starting run");

        // Held while waiting out the start delay so starts stay spaced
        let start_gate = Arc::new(Mutex::new(false));

        let mut results: Vec<(usize, WorkflowResult)> = stream::iter(accounts.into_iter().enumerate())
            .map(|(index, account)| {
                let factory = Arc::clone(&self.factory);
                let settings = Arc::clone(&self.settings);
                let diagnostics = Arc::clone(&self.diagnostics);
                let reports = Arc::clone(&self.reports);
                let start_gate = Arc::clone(&start_gate);
                async move {
                    {
                        let mut started = start_gate.lock().await;
                        if *started {
                            let delay = settings.runner.start_delay.sample();
                            info!(
                                account = %account.identifier,
                                delay_secs = delay.as_secs_f64(),
                                "Waiting before starting account"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        *started = true;
                    }

                    let account_id = account.identifier.clone();
                    let task = tokio::spawn(run_account(
                        factory,
                        Arc::clone(&settings),
                        diagnostics,
                        Arc::clone(&reports),
                        account,
                    ));
                    let result = match task.await {
                        Ok(result) => result,
                        Err(e) => {
                            error!(account = %account_id, error = %e, "Account worker aborted");
                            WorkflowResult::not_started(
                                account_id,
                                WorkflowError::Internal(format!("account worker aborted: {e}")),
                            )
                        }
                    };
                    reports.account(&AccountReport::from(&result));

                    if index + 1 < total {
                        let cooldown = settings.runner.cooldown.sample();
                        info!(
                            account = %result.account_id,
                            cooldown_secs = cooldown.as_secs_f64(),
                            "Account finished, cooling down"
                        );
                        tokio::time::sleep(cooldown).await;
                    }
                    (index, result)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        let results: Vec<WorkflowResult> = results.into_iter().map(|(_, r)| r).collect();
        let summary = RunSummary::from_results(&results);
        info!(
            done = summary.done,
            failed = summary.failed,
            "All accounts processed"
        );
        results
    }
}

async fn run_account(
    factory: Arc<dyn SessionFactory>,
    settings: Arc<Settings>,
    diagnostics: Arc<dyn DiagnosticSink>,
    reports: Arc<dyn ReportSink>,
    account: Account,
) -> WorkflowResult {
    let driver = match factory.open(&account).await {
        Ok(driver) => driver,
        Err(e) => {
            error!(account = %account.identifier, error = %e, "Could not open a browser session");
            return WorkflowResult::not_started(
                account.identifier,
                WorkflowError::SessionUnavailable(e.to_string()),
            );
        }
    };
    let session = Session::new(
        driver,
        account.identifier.clone(),
        diagnostics,
        settings.pacing.clone(),
    );
    WorkflowOrchestrator::new(account, settings, session)
        .with_report_sink(reports)
        .run()
        .await
}
