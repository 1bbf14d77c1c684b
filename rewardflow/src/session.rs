use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Span};

use crate::diagnostics::DiagnosticSink;
use crate::driver::AutomationDriver;
use crate::errors::AutomationError;
use crate::pacing::{DelayRange, PacingPolicy};

const TEXT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything one account workflow needs to talk to its browser.
///
/// Owns the driver exclusively. Call [`Session::close`] to release it; the
/// orchestrator does so on every exit path.
pub struct Session {
    driver: Box<dyn AutomationDriver>,
    diagnostics: Arc<dyn DiagnosticSink>,
    account_id: String,
    pacing: PacingPolicy,
    span: Span,
    closed: bool,
}

impl Session {
    pub fn new(
        driver: Box<dyn AutomationDriver>,
        account_id: impl Into<String>,
        diagnostics: Arc<dyn DiagnosticSink>,
        pacing: PacingPolicy,
    ) -> Self {
        let account_id = account_id.into();
        let span = info_span!("account", id = %account_id);
        Self {
            driver,
            diagnostics,
            account_id,
            pacing,
            span,
            closed: false,
        }
    }

    pub fn driver(&self) -> &dyn AutomationDriver {
        self.driver.as_ref()
    }

    pub fn pacing(&self) -> &PacingPolicy {
        &self.pacing
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub async fn pause(&self, range: &DelayRange) {
        let delay = range.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Navigate, then wait out the navigation pacing.
    pub async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        debug!(url, "Navigating");
        self.driver.navigate(url).await?;
        self.pause(&self.pacing.navigation).await;
        Ok(())
    }

    /// Poll the document text until it contains `marker`, up to `timeout`.
    pub async fn wait_for_text(&self, marker: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.driver.current_document_text().await {
                Ok(text) if text.contains(marker) => return true,
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Reading document text failed"),
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(TEXT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Save a screenshot and the page source under `label`. Never fails.
    pub async fn capture_diagnostics(&self, label: &str) {
        let screenshot = match self.driver.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Screenshot unavailable for diagnostics");
                Vec::new()
            }
        };
        let dom_text = match self.driver.current_document_text().await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Page source unavailable for diagnostics");
                String::new()
            }
        };
        let full_label = format!("{}_{}", self.account_id, label);
        if let Err(e) = self
            .diagnostics
            .save(&full_label, &screenshot, &dom_text)
            .await
        {
            warn!(label = %full_label, error = %e, "Failed to save diagnostics");
        }
    }

    /// Release the browser and any transient resources it holds.
    pub async fn close(mut self) -> Result<(), AutomationError> {
        self.closed = true;
        self.driver.close().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                account = %self.account_id,
                "Session dropped without close; relying on driver cleanup"
            );
        }
    }
}
