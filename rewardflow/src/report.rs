//! Human-readable per-account reports.

use serde::Serialize;
use std::fmt;

use crate::points::{PointsDelta, PointsValue};
use crate::workflow::{CheckInOutcome, WorkflowResult, WorkflowState};

const RULE: &str = "===================";

/// Emitted right after a successful check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInReport {
    pub account_id: String,
    pub initial: PointsValue,
    pub after_check_in: PointsValue,
    pub earned: PointsDelta,
}

impl fmt::Display for CheckInReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Check-in report ===")?;
        writeln!(f, "Account: {}", self.account_id)?;
        writeln!(f, "Initial points: {}", self.initial)?;
        writeln!(f, "Points after check-in: {}", self.after_check_in)?;
        writeln!(f, "Earned by check-in: {}", self.earned)?;
        write!(f, "{RULE}")
    }
}

/// Emitted once per account, whether it completed or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    pub account_id: String,
    pub succeeded: bool,
    pub check_in: Option<CheckInOutcome>,
    pub initial: PointsValue,
    pub after_check_in: PointsValue,
    pub final_points: PointsValue,
    pub check_in_delta: PointsDelta,
    pub share_delta: PointsDelta,
    pub total_delta: PointsDelta,
    pub successful_shares: u32,
    pub share_attempts: usize,
    /// `"<state>: <error>"` for failed accounts.
    pub failure: Option<String>,
}

impl From<&WorkflowResult> for AccountReport {
    fn from(result: &WorkflowResult) -> Self {
        let failure = result.failure.as_ref().map(|e| {
            let state = result.failed_in.unwrap_or(WorkflowState::Failed);
            format!("{state}: {e}")
        });
        Self {
            account_id: result.account_id.clone(),
            succeeded: result.is_success(),
            check_in: result.check_in,
            initial: result.initial_points,
            after_check_in: result.after_check_in_points,
            final_points: result.final_points,
            check_in_delta: result.earned.check_in,
            share_delta: result.earned.share,
            total_delta: result.earned.total,
            successful_shares: result.successful_shares,
            share_attempts: result.share_attempts.len(),
            failure,
        }
    }
}

impl fmt::Display for AccountReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Account report ===")?;
        writeln!(f, "Account: {}", self.account_id)?;
        writeln!(f, "Initial points: {}", self.initial)?;
        writeln!(f, "Points after check-in: {}", self.after_check_in)?;
        writeln!(f, "Final points: {}", self.final_points)?;
        writeln!(f, "Earned by check-in: {}", self.check_in_delta)?;
        writeln!(f, "Earned by sharing: {}", self.share_delta)?;
        writeln!(f, "Total earned: {}", self.total_delta)?;
        if let Some(check_in) = self.check_in {
            writeln!(f, "Check-in: {check_in}")?;
        }
        writeln!(
            f,
            "Shares: {}/{} succeeded",
            self.successful_shares, self.share_attempts
        )?;
        match &self.failure {
            Some(failure) => writeln!(f, "Status: FAILED ({failure})")?,
            None => writeln!(f, "Status: done")?,
        }
        write!(f, "{RULE}")
    }
}

/// Where reports go.
pub trait ReportSink: Send + Sync {
    fn check_in(&self, report: &CheckInReport);
    fn account(&self, report: &AccountReport);
}

/// Prints reports to standard output, separate from the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutReportSink;

impl ReportSink for StdoutReportSink {
    fn check_in(&self, report: &CheckInReport) {
        println!("\n{report}\n");
    }

    fn account(&self, report: &AccountReport) {
        println!("\n{report}\n");
    }
}
