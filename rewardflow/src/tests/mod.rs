
mod config_tests;
mod locator_tests;
mod retry_tests;
mod runner_tests;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::config::Settings;
use crate::diagnostics::DiagnosticSink;
use crate::pacing::PacingPolicy;
use crate::points::ReconcilePolicy;
use crate::report::{AccountReport, CheckInReport, ReportSink};
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::site::SiteLocators;
use crate::share::Channel;
use std::time::Duration;

pub use mock_page::{Effect, MockElement, MockPage};

pub const ACCOUNT: &str = "tester@example.com";
pub const NEWS_MARKER: &str = "Weekly News Highlights";

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// Captured diagnostics labels, in order.
#[derive(Default)]
pub struct RecordingDiagnostics {
    labels: Mutex<Vec<String>>,
}

impl RecordingDiagnostics {
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosticSink for RecordingDiagnostics {
    async fn save(&self, label: &str, _screenshot: &[u8], _dom_text: &str) -> std::io::Result<()> {
        self.labels.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReports {
    pub check_ins: Mutex<Vec<CheckInReport>>,
    pub accounts: Mutex<Vec<AccountReport>>,
}

impl ReportSink for RecordingReports {
    fn check_in(&self, report: &CheckInReport) {
        self.check_ins.lock().unwrap().push(report.clone());
    }

    fn account(&self, report: &AccountReport) {
        self.accounts.lock().unwrap().push(report.clone());
    }
}

pub fn session_for(page: &MockPage) -> Session {
    session_with_diagnostics(page, Arc::new(RecordingDiagnostics::default()))
}

pub fn session_with_diagnostics(page: &MockPage, diagnostics: Arc<RecordingDiagnostics>) -> Session {
    Session::new(
        Box::new(page.clone()),
        ACCOUNT,
        diagnostics,
        PacingPolicy::immediate(),
    )
}

/// Defaults with no pacing and short waits, pointed at a fake origin.
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.site.base_url = "https://rewards.test".to_string();
    settings.pacing = PacingPolicy::immediate();
    settings.click_retry = RetryPolicy::new(2, Duration::from_millis(100), Duration::ZERO);
    settings.wait_retry = RetryPolicy::new(2, Duration::from_millis(100), Duration::ZERO);
    settings.timeouts.element_ms = 1_000;
    settings.timeouts.auth_ms = 1_000;
    settings.timeouts.marker_ms = 2_000;
    settings.timeouts.points_read_ms = 500;
    settings.timeouts.share_control_ms = 500;
    settings.reconcile = ReconcilePolicy {
        max_polls: 3,
        poll_delay_ms: 1_000,
        poll_jitter_ms: 0,
        confirm_reads: 0,
    };
    settings.runner.start_delay = crate::pacing::DelayRange::zero();
    settings.runner.cooldown = crate::pacing::DelayRange::zero();
    settings
}

/// Element matching every candidate of a default locator set.
pub fn element_for(name: &str, selectors: &crate::locator::LocatorCandidateSet) -> MockElement {
    MockElement::new(name, selectors.candidates.clone())
}

/// A logged-out home page of the stock site where every step can succeed.
///
/// `points` are the successive readings of the points display. Signing in
/// reveals the display and the check-in button; the share trigger is the
/// second `shareBox` on the page.
pub fn mock_site(points: &[&'static str]) -> MockPage {
    let locators = SiteLocators::default();
    let mut page = MockPage::new()
        .with_document_text(&format!("<html><h2>{NEWS_MARKER}</h2></html>"))
        .with(element_for("sign_in", &locators.sign_in))
        .with(element_for("username", &locators.username_input))
        .with(element_for("password", &locators.password_input))
        .with(element_for("login", &locators.login_submit).on_click(Effect::Show("points")))
        .with(
            element_for("points", &locators.points_display)
                .hidden()
                .text(points.iter().copied()),
        )
        .with(element_for("check_in", &locators.check_in_button))
        .with(element_for("share_dialog", &locators.share_dialog))
        .with(MockElement::new("header_share", share_box_selectors()))
        .with(MockElement::new("article_share", share_box_selectors()));
    for channel in Channel::ALL {
        let target = channel.default_target();
        page = page.with(element_for(channel.name(), &target.candidates));
    }
    page
}

/// Inner selectors of the default share trigger candidates, without the `nth` narrowing.
fn share_box_selectors() -> Vec<crate::selector::Selector> {
    SiteLocators::default()
        .share_trigger
        .candidates
        .into_iter()
        .map(|selector| match selector {
            crate::selector::Selector::Nth { inner, .. } => *inner,
            other => other,
        })
        .collect()
}
