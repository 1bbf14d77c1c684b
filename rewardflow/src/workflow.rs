//! Per-account state machine: login, daily check-in, share campaign and
//! points reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use crate::config::{Account, Settings};
use crate::dialog::DialogDismisser;
use crate::driver::ElementRef;
use crate::errors::{AutomationError, WorkflowError};
use crate::interaction::ActionExecutor;
use crate::locator::{LocatorCandidateSet, LocatorResolver};
use crate::points::{Checkpoint, PointsDelta, PointsLedger, PointsValue};
use crate::report::{CheckInReport, ReportSink};
use crate::retry::{ActionOutcome, RetryingActionExecutor};
use crate::session::Session;
use crate::share::{ShareAttempt, ShareCampaignRunner, ShareSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    Init,
    LoggedIn,
    PointsCentered,
    CheckedIn,
    NewsPage,
    SharePending,
    ShareDone,
    Reconciled,
    Done,
    Failed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckInOutcome {
    Success,
    AlreadyDone,
    NotFound,
    Error,
}

impl fmt::Display for CheckInOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckInOutcome::Success => "success",
            CheckInOutcome::AlreadyDone => "already done",
            CheckInOutcome::NotFound => "not found",
            CheckInOutcome::Error => "error",
        })
    }
}

/// Points gained between checkpoint pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsEarned {
    /// Initial to AfterCheckIn.
    pub check_in: PointsDelta,
    /// AfterCheckIn to Final.
    pub share: PointsDelta,
    /// Initial to Final.
    pub total: PointsDelta,
}

impl PointsEarned {
    pub fn from_ledger(ledger: &PointsLedger) -> Self {
        Self {
            check_in: ledger.delta(Checkpoint::Initial, Checkpoint::AfterCheckIn),
            share: ledger.delta(Checkpoint::AfterCheckIn, Checkpoint::Final),
            total: ledger.delta(Checkpoint::Initial, Checkpoint::Final),
        }
    }

    pub fn unknown() -> Self {
        Self {
            check_in: PointsDelta::Unknown,
            share: PointsDelta::Unknown,
            total: PointsDelta::Unknown,
        }
    }
}

/// The single terminal record of one account's run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    pub account_id: String,
    pub check_in: Option<CheckInOutcome>,
    pub successful_shares: u32,
    pub share_attempts: Vec<ShareAttempt>,
    pub share_surface_opened: bool,
    pub initial_points: PointsValue,
    pub after_check_in_points: PointsValue,
    pub final_points: PointsValue,
    pub earned: PointsEarned,
    /// Whether reconciliation saw the final balance change; `None` if it never ran.
    pub points_settled: Option<bool>,
    /// `Done` or `Failed`.
    pub terminal_state: WorkflowState,
    /// Last state reached before failing.
    pub failed_in: Option<WorkflowState>,
    pub failure: Option<WorkflowError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WorkflowResult {
    /// Result for an account whose workflow never started, e.g. the browser did not launch.
    pub fn not_started(account_id: impl Into<String>, failure: WorkflowError) -> Self {
        let now = Utc::now();
        Self {
            account_id: account_id.into(),
            check_in: None,
            successful_shares: 0,
            share_attempts: Vec::new(),
            share_surface_opened: false,
            initial_points: PointsValue::Unknown,
            after_check_in_points: PointsValue::Unknown,
            final_points: PointsValue::Unknown,
            earned: PointsEarned::unknown(),
            points_settled: None,
            terminal_state: WorkflowState::Failed,
            failed_in: Some(WorkflowState::Init),
            failure: Some(failure),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.terminal_state == WorkflowState::Done
    }
}

#[derive(Default)]
struct Progress {
    check_in: Option<CheckInOutcome>,
    share_attempts: Vec<ShareAttempt>,
    successful_shares: u32,
    share_surface_opened: bool,
    points_settled: Option<bool>,
}

/// Drives one account through the workflow with an exclusively owned session.
pub struct WorkflowOrchestrator {
    account: Account,
    settings: Arc<Settings>,
    session: Session,
    ledger: PointsLedger,
    report_sink: Option<Arc<dyn ReportSink>>,
    state: WorkflowState,
}

impl WorkflowOrchestrator {
    pub fn new(account: Account, settings: Arc<Settings>, session: Session) -> Self {
        let ledger = PointsLedger::new(
            settings.site.locators.points_display.clone(),
            settings.timeouts.points_read(),
        );
        Self {
            account,
            settings,
            session,
            ledger,
            report_sink: None,
            state: WorkflowState::Init,
        }
    }

    /// Receives the interim check-in report.
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.report_sink = Some(sink);
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Run to a terminal state. The session is closed exactly once on every path.
    pub async fn run(mut self) -> WorkflowResult {
        let span = self.session.span().clone();
        async move {
            let started_at = Utc::now();
            info!(account = %self.account.identifier, "Starting workflow");
            let mut progress = Progress::default();
            let outcome = self.execute(&mut progress).await;
            self.finish(progress, outcome, started_at).await
        }
        .instrument(span)
        .await
    }

    async fn execute(&mut self, progress: &mut Progress) -> Result<(), WorkflowError> {
        let settings = Arc::clone(&self.settings);
        let site = &settings.site;

        self.session
            .navigate(&site.home_url())
            .await
            .map_err(|e| WorkflowError::Navigation(format!("opening {}: {e}", site.home_url())))?;
        self.login().await?;
        self.transition(WorkflowState::LoggedIn);

        self.ledger.record(&self.session, Checkpoint::Initial).await;

        self.session
            .navigate(&site.rewards_url())
            .await
            .map_err(|e| WorkflowError::Navigation(format!("rewards center: {e}")))?;
        self.dismiss_dialog().await;
        self.transition(WorkflowState::PointsCentered);

        let check_in = self.check_in().await;
        progress.check_in = Some(check_in);
        self.transition(WorkflowState::CheckedIn);
        self.record_after_check_in(check_in).await;

        self.transition(WorkflowState::NewsPage);
        self.open_news_page().await?;
        self.transition(WorkflowState::SharePending);

        self.share_campaign(progress).await;
        self.transition(WorkflowState::ShareDone);

        self.session
            .pause(&self.session.pacing().share_settle)
            .await;
        if let Err(e) = self.session.navigate(&site.home_url()).await {
            warn!(error = %e, "Navigating home before reconciliation failed");
        }
        let reconciliation = self
            .ledger
            .reconcile(
                &self.session,
                Checkpoint::AfterCheckIn,
                Checkpoint::Final,
                &settings.reconcile,
            )
            .await;
        progress.points_settled = Some(reconciliation.settled);
        info!(
            delta = %reconciliation.delta,
            settled = reconciliation.settled,
            polls = reconciliation.polls,
            "Reconciled share points"
        );
        self.transition(WorkflowState::Reconciled);
        Ok(())
    }

    async fn login(&self) -> Result<(), WorkflowError> {
        let settings = Arc::clone(&self.settings);
        let locators = &settings.site.locators;

        if self.dismiss_dialog().await {
            info!("Closed initial dialog");
        }

        let clicker = RetryingActionExecutor::new(
            &self.session,
            &locators.dialog_close,
            settings.click_retry.clone(),
        )
        .with_element_timeout(settings.timeouts.element());

        // Each sign-in candidate gets its own retry cycle
        for (index, selector) in locators.sign_in.iter().enumerate() {
            let candidate = LocatorCandidateSet::single(
                format!("{}[{index}]", locators.sign_in.name),
                selector.clone(),
            );
            if !clicker.click_target(&candidate).await.is_success() {
                continue;
            }
            info!(%selector, "Clicked sign-in control");

            let Some(username) = self.wait_for_input(&locators.username_input).await else {
                continue;
            };
            let Some(password) = self.wait_for_input(&locators.password_input).await else {
                continue;
            };

            let actions = ActionExecutor::new(self.session.driver());
            let typed = async {
                actions.type_into(&username, &self.account.identifier).await?;
                actions.type_into(&password, &self.account.secret).await
            }
            .await;
            if let Err(e) = typed {
                warn!(error = %e, "Typing credentials failed");
                continue;
            }
            info!("Entered credentials");

            if !clicker.click_target(&locators.login_submit).await.is_success() {
                continue;
            }
            self.session.pause(&self.session.pacing().navigation).await;

            return match LocatorResolver::new(self.session.driver())
                .resolve(&locators.points_display, settings.timeouts.auth())
                .await
            {
                Ok(_) => {
                    info!("Logged in");
                    Ok(())
                }
                Err(_) => Err(WorkflowError::Authentication(
                    "credentials submitted but the points display never appeared".to_string(),
                )),
            };
        }

        Err(WorkflowError::transient(
            "login",
            "sign-in control or login form unavailable",
        ))
    }

    async fn wait_for_input(
        &self,
        target: &LocatorCandidateSet,
    ) -> Option<ElementRef> {
        let driver = self.session.driver();
        let timeout = self.settings.timeouts.element();
        RetryingActionExecutor::new(
            &self.session,
            &self.settings.site.locators.dialog_close,
            self.settings.wait_retry.clone(),
        )
        .execute_with_retry(&target.name, |_| async move {
            LocatorResolver::new(driver)
                .resolve(target, timeout)
                .await
                .map(|found| found.element)
        })
        .await
        .value()
    }

    /// Claim the daily bonus unless the page already shows it claimed.
    async fn check_in(&self) -> CheckInOutcome {
        let settings = Arc::clone(&self.settings);
        let locators = &settings.site.locators;

        if LocatorResolver::new(self.session.driver())
            .any_visible(&locators.check_in_done)
            .await
        {
            info!("Already checked in today");
            return CheckInOutcome::AlreadyDone;
        }

        let clicker = RetryingActionExecutor::new(
            &self.session,
            &locators.dialog_close,
            settings.click_retry.clone(),
        )
        .with_element_timeout(settings.timeouts.element());

        let mut fatal: Option<AutomationError> = None;
        for (index, selector) in locators.check_in_button.iter().enumerate() {
            let candidate = LocatorCandidateSet::single(
                format!("{}[{index}]", locators.check_in_button.name),
                selector.clone(),
            );
            match clicker.click_target(&candidate).await {
                ActionOutcome::Success { .. } => {
                    info!(%selector, "Checked in");
                    self.session
                        .pause(&self.session.pacing().check_in_settle)
                        .await;
                    return CheckInOutcome::Success;
                }
                ActionOutcome::Exhausted {
                    last_error: Some(e),
                    ..
                } if !e.is_transient() => {
                    fatal = Some(e);
                    break;
                }
                ActionOutcome::Exhausted { .. } => {}
            }
        }

        match fatal {
            Some(e) => {
                error!(error = %e, "Check-in failed");
                self.session.capture_diagnostics("check_in_failure").await;
                CheckInOutcome::Error
            }
            None => {
                warn!("Check-in control not found or not clickable");
                CheckInOutcome::NotFound
            }
        }
    }

    async fn record_after_check_in(&mut self, outcome: CheckInOutcome) {
        if outcome != CheckInOutcome::Success {
            let initial = self.ledger.value(Checkpoint::Initial);
            self.ledger.record_value(Checkpoint::AfterCheckIn, initial);
            return;
        }

        let home = self.settings.site.home_url();
        if let Err(e) = self.session.navigate(&home).await {
            warn!(error = %e, "Navigating home after check-in failed");
        }
        self.ledger
            .record(&self.session, Checkpoint::AfterCheckIn)
            .await;

        if let Some(sink) = &self.report_sink {
            sink.check_in(&CheckInReport {
                account_id: self.account.identifier.clone(),
                initial: self.ledger.value(Checkpoint::Initial),
                after_check_in: self.ledger.value(Checkpoint::AfterCheckIn),
                earned: self.ledger.delta(Checkpoint::Initial, Checkpoint::AfterCheckIn),
            });
        }
    }

    async fn open_news_page(&self) -> Result<(), WorkflowError> {
        let site = &self.settings.site;
        self.session
            .navigate(&site.news_url())
            .await
            .map_err(|e| WorkflowError::Navigation(format!("news page: {e}")))?;
        if !self
            .session
            .wait_for_text(&site.news_ready_marker, self.settings.timeouts.marker())
            .await
        {
            return Err(WorkflowError::Navigation(format!(
                "news page never showed '{}'",
                site.news_ready_marker
            )));
        }
        self.dismiss_dialog().await;
        Ok(())
    }

    /// Up to `share.rounds` rounds of "open the share surface, then run the campaign".
    async fn share_campaign(&self, progress: &mut Progress) {
        let settings = &self.settings;
        let locators = &settings.site.locators;
        let surface = ShareSurface {
            dialog: &locators.share_dialog,
            trigger: &locators.share_trigger,
            interstitials: &locators.dialog_close,
            open_attempts: settings.share.open_attempts,
            page_marker: &settings.site.news_ready_marker,
            marker_timeout: settings.timeouts.marker(),
            control_timeout: settings.timeouts.share_control(),
        };

        let rounds = settings.share.rounds.max(1);
        for round in 1..=rounds {
            if surface.open(&self.session).await {
                let report = ShareCampaignRunner::new(&self.session, settings.timeouts.share_control())
                    .run(settings.share.quota, &settings.site.channels, &surface)
                    .await;
                progress.share_surface_opened = true;
                progress.successful_shares = report.success_count();
                progress.share_attempts = report.attempts;
                info!(
                    successes = progress.successful_shares,
                    quota = settings.share.quota,
                    "Share campaign complete"
                );
                return;
            }
            if round < rounds {
                warn!(round, rounds, "Share surface did not open, retrying the round");
                self.session
                    .pause(&self.session.pacing().between_share_rounds)
                    .await;
            }
        }
        error!(rounds, "Share surface never opened, skipping the campaign");
    }

    async fn dismiss_dialog(&self) -> bool {
        let dismissed = DialogDismisser::new(
            self.session.driver(),
            &self.settings.site.locators.dialog_close,
        )
        .dismiss_if_present()
        .await;
        if dismissed {
            self.session.pause(&self.session.pacing().dialog).await;
        }
        dismissed
    }

    fn transition(&mut self, next: WorkflowState) {
        info!(from = %self.state, to = %next, "Workflow state");
        self.state = next;
    }

    async fn finish(
        mut self,
        progress: Progress,
        outcome: Result<(), WorkflowError>,
        started_at: DateTime<Utc>,
    ) -> WorkflowResult {
        let (failed_in, failure) = match outcome {
            Ok(()) => {
                self.transition(WorkflowState::Done);
                (None, None)
            }
            Err(e) => {
                let failed_in = self.state;
                error!(state = %failed_in, error = %e, "Workflow failed");
                self.session.capture_diagnostics("general_failure").await;
                self.transition(WorkflowState::Failed);
                (Some(failed_in), Some(e))
            }
        };

        let WorkflowOrchestrator {
            account,
            session,
            ledger,
            state,
            ..
        } = self;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Closing the browser session failed");
        } else {
            info!("Browser session closed");
        }

        WorkflowResult {
            account_id: account.identifier,
            check_in: progress.check_in,
            successful_shares: progress.successful_shares,
            share_attempts: progress.share_attempts,
            share_surface_opened: progress.share_surface_opened,
            initial_points: ledger.value(Checkpoint::Initial),
            after_check_in_points: ledger.value(Checkpoint::AfterCheckIn),
            final_points: ledger.value(Checkpoint::Final),
            earned: PointsEarned::from_ledger(&ledger),
            points_settled: progress.points_settled,
            terminal_state: state,
            failed_in,
            failure,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
