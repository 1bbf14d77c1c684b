use thiserror::Error;

/// Failures reported by the automation driver and the interaction helpers built on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Element is not visible: {0}")]
    ElementNotVisible(String),

    #[error("Element is obscured by another element: {0}")]
    ElementObscured(String),

    #[error("Element is detached from DOM: {0}")]
    ElementDetached(String),

    #[error("Failed to scroll element into view: {0}")]
    ScrollFailed(String),

    #[error("Script execution failed: {0}")]
    ScriptError(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Session is closed: {0}")]
    SessionClosed(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutomationError {
    /// Whether retrying the same interaction later can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AutomationError::ElementNotFound(_)
                | AutomationError::Timeout(_)
                | AutomationError::ElementNotVisible(_)
                | AutomationError::ElementObscured(_)
                | AutomationError::ElementDetached(_)
                | AutomationError::ScrollFailed(_)
                | AutomationError::ScriptError(_)
        )
    }
}

/// Stage-level failures of an account workflow.
///
/// Unparsable points text is not an error: it becomes
/// [`PointsValue::Unknown`](crate::points::PointsValue::Unknown).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Transient UI error in {stage}: {message}")]
    TransientUi { stage: String, message: String },

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn transient(stage: impl Into<String>, message: impl Into<String>) -> Self {
        WorkflowError::TransientUi {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
