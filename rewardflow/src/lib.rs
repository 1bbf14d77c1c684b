//! Resilient account workflows over a flaky browser UI: sign in, claim the
//! daily check-in, run a share campaign across channels and reconcile the
//! displayed points balance.
//!
//! Everything is written against [`AutomationDriver`]; the `chromium`
//! feature provides a Chrome DevTools backed implementation.

pub mod config;
pub mod diagnostics;
pub mod dialog;
pub mod driver;
pub mod errors;
pub mod interaction;
pub mod locator;
pub mod pacing;
pub mod platforms;
pub mod points;
pub mod report;
pub mod retry;
pub mod runner;
pub mod selector;
pub mod session;
pub mod share;
pub mod site;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use config::{
    load_accounts_from_env, load_accounts_from_file, load_accounts_from_str, Account,
    ConfigError, Settings, ACCOUNTS_ENV,
};
pub use diagnostics::{DiagnosticSink, FileDiagnosticSink, NullDiagnosticSink};
pub use dialog::DialogDismisser;
pub use driver::{AutomationDriver, ElementRef, ScriptArg, SessionFactory};
pub use errors::{AutomationError, WorkflowError};
pub use interaction::{ActionExecutor, ClickMethod};
pub use locator::{LocatorCandidateSet, LocatorResolver, ResolvedElement};
pub use pacing::{DelayRange, PacingPolicy};
pub use points::{
    Checkpoint, PointsDelta, PointsLedger, PointsSnapshot, PointsValue, ReconcilePolicy,
    Reconciliation,
};
pub use report::{AccountReport, CheckInReport, ReportSink, StdoutReportSink};
pub use retry::{ActionOutcome, RetryPolicy, RetryingActionExecutor};
pub use runner::{RunSummary, Runner};
pub use selector::Selector;
pub use session::Session;
pub use share::{
    CampaignReport, Channel, ChannelTarget, ShareAttempt, ShareCampaignRunner, ShareOutcome,
    ShareSurface,
};
pub use site::{SiteLocators, SiteProfile};
pub use workflow::{
    CheckInOutcome, PointsEarned, WorkflowOrchestrator, WorkflowResult, WorkflowState,
};
