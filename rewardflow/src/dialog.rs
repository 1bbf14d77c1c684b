use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::driver::AutomationDriver;
use crate::interaction::{scripts, ActionExecutor};
use crate::locator::{LocatorCandidateSet, LocatorResolver};

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Closes overlay dialogs that block interaction.
pub struct DialogDismisser<'a> {
    driver: &'a dyn AutomationDriver,
    close_controls: &'a LocatorCandidateSet,
    ready_timeout: Duration,
}

impl<'a> DialogDismisser<'a> {
    pub fn new(driver: &'a dyn AutomationDriver, close_controls: &'a LocatorCandidateSet) -> Self {
        Self {
            driver,
            close_controls,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    /// Click the first visible close control, if any. Returns whether a dialog was dismissed.
    ///
    /// One dialog per call; a no-op returning `false` when nothing is open.
    /// Internal failures degrade to `false`.
    pub async fn dismiss_if_present(&self) -> bool {
        if !self.wait_document_ready().await {
            debug!("Document not ready, probing for dialogs anyway");
        }

        let resolver = LocatorResolver::new(self.driver);
        let found = match resolver.resolve(self.close_controls, Duration::ZERO).await {
            Ok(found) => found,
            Err(_) => return false,
        };

        match ActionExecutor::new(self.driver).click(&found.element).await {
            Ok(method) => {
                info!(selector = %found.selector, ?method, "Dismissed dialog");
                true
            }
            Err(e) => {
                warn!(selector = %found.selector, error = %e, "Failed to dismiss dialog");
                false
            }
        }
    }

    async fn wait_document_ready(&self) -> bool {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            match self
                .driver
                .execute_script(scripts::DOCUMENT_READY_STATE, &[])
                .await
            {
                Ok(state) if state.as_str() == Some("complete") => return true,
                Ok(_) => {}
                Err(e) => debug!(error = %e, "readyState probe failed"),
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(READY_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
