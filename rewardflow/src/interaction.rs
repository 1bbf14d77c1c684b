//! Two-tier element interaction: native UI events first, a script-level
//! fallback only when the native attempt is rejected.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::driver::{AutomationDriver, ElementRef, ScriptArg};
use crate::errors::AutomationError;
use crate::pacing::DelayRange;

/// Script bodies shared by every driver. Elements arrive as `arguments[0]`.
pub mod scripts {
    pub const FORCE_CLICK: &str = "arguments[0].click();";
    pub const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView(true);";
    pub const DOCUMENT_READY_STATE: &str = "return document.readyState;";
}

/// How a click was eventually delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClickMethod {
    Native,
    Scripted,
}

#[derive(Clone, Copy)]
pub struct ActionExecutor<'a> {
    driver: &'a dyn AutomationDriver,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(driver: &'a dyn AutomationDriver) -> Self {
        Self { driver }
    }

    pub async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), AutomationError> {
        self.driver
            .execute_script(scripts::SCROLL_INTO_VIEW, &[ScriptArg::from(element)])
            .await
            .map(|_| ())
            .map_err(|e| AutomationError::ScrollFailed(format!("{element}: {e}")))
    }

    /// Click `element`, falling back to a forced script click if the direct click is rejected.
    pub async fn click(&self, element: &ElementRef) -> Result<ClickMethod, AutomationError> {
        let native_error = match self.driver.click(element).await {
            Ok(()) => return Ok(ClickMethod::Native),
            Err(e) => e,
        };
        debug!(%element, error = %native_error, "Direct click rejected, forcing script click");

        match self
            .driver
            .execute_script(scripts::FORCE_CLICK, &[ScriptArg::from(element)])
            .await
        {
            Ok(_) => Ok(ClickMethod::Scripted),
            Err(script_error) => {
                warn!(%element, %native_error, %script_error, "Both click methods failed");
                Err(script_error)
            }
        }
    }

    /// Scroll into view (best effort), wait out `settle`, then click.
    pub async fn scroll_and_click(
        &self,
        element: &ElementRef,
        settle: &DelayRange,
    ) -> Result<ClickMethod, AutomationError> {
        if let Err(e) = self.scroll_into_view(element).await {
            debug!(error = %e, "Continuing without scroll");
        }
        let delay = settle.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.click(element).await
    }

    pub async fn type_into(&self, element: &ElementRef, text: &str) -> Result<(), AutomationError> {
        self.driver.type_text(element, text).await
    }
}
