//! Points checkpoints and reconciliation of an asynchronously updated score.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::locator::{LocatorCandidateSet, LocatorResolver};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Checkpoint {
    Initial,
    AfterCheckIn,
    Final,
}

/// A displayed score, or `Unknown` when the display was absent or not numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointsValue {
    Known(u64),
    Unknown,
}

impl PointsValue {
    /// Parse display text such as `"12,345"` or `"12 345"`.
    pub fn parse(text: &str) -> Self {
        let digits: String = text
            .trim()
            .chars()
            .filter(|c| !matches!(c, ',' | '\'' | '_' | ' ' | '\u{a0}' | '\u{202f}'))
            .collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return PointsValue::Unknown;
        }
        digits
            .parse::<u64>()
            .map(PointsValue::Known)
            .unwrap_or(PointsValue::Unknown)
    }

    pub fn known(&self) -> Option<u64> {
        match self {
            PointsValue::Known(v) => Some(*v),
            PointsValue::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.known().is_some()
    }

    /// `to - self`; unknown if either side is, or if the difference overflows `i64`.
    pub fn delta_to(&self, to: PointsValue) -> PointsDelta {
        match (self.known(), to.known()) {
            (Some(from), Some(to)) => i64::try_from(i128::from(to) - i128::from(from))
                .map(PointsDelta::Known)
                .unwrap_or(PointsDelta::Unknown),
            _ => PointsDelta::Unknown,
        }
    }
}

impl fmt::Display for PointsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointsValue::Known(v) => write!(f, "{v}"),
            PointsValue::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointsDelta {
    Known(i64),
    Unknown,
}

impl PointsDelta {
    pub fn known(&self) -> Option<i64> {
        match self {
            PointsDelta::Known(v) => Some(*v),
            PointsDelta::Unknown => None,
        }
    }
}

impl fmt::Display for PointsDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointsDelta::Known(v) => write!(f, "{v}"),
            PointsDelta::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsSnapshot {
    pub checkpoint: Checkpoint,
    pub value: PointsValue,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilePolicy {
    pub max_polls: u32,
    pub poll_delay_ms: u64,
    /// Upper (exclusive) bound of the random addition to every poll delay.
    pub poll_jitter_ms: u64,
    /// Extra identical readings required before a changed value is accepted.
    pub confirm_reads: u32,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_polls: 3,
            poll_delay_ms: 5_000,
            poll_jitter_ms: 3_000,
            confirm_reads: 0,
        }
    }
}

impl ReconcilePolicy {
    /// `poll_delay_ms + U[0, poll_jitter_ms)`.
    pub fn poll_delay(&self) -> Duration {
        let jitter = if self.poll_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.poll_jitter_ms)
        };
        Duration::from_millis(self.poll_delay_ms.saturating_add(jitter))
    }
}

/// Outcome of [`PointsLedger::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub snapshot: PointsSnapshot,
    pub delta: PointsDelta,
    /// False when the poll budget ran out before the value changed.
    pub settled: bool,
    pub polls: u32,
}

/// Records named checkpoints of the displayed score.
#[derive(Debug, Clone)]
pub struct PointsLedger {
    display: LocatorCandidateSet,
    read_timeout: Duration,
    snapshots: Vec<PointsSnapshot>,
}

impl PointsLedger {
    pub fn new(display: LocatorCandidateSet, read_timeout: Duration) -> Self {
        Self {
            display,
            read_timeout,
            snapshots: Vec::new(),
        }
    }

    /// Parse the first visible points display. Absent or non-numeric text yields `Unknown`.
    pub async fn read_current(&self, session: &Session) -> PointsValue {
        let driver = session.driver();
        let found = match LocatorResolver::new(driver)
            .resolve(&self.display, self.read_timeout)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Points display not found");
                return PointsValue::Unknown;
            }
        };
        match driver.read_text(&found.element).await {
            Ok(text) => {
                let value = PointsValue::parse(&text);
                if value.is_known() {
                    debug!(%value, "Read points");
                } else {
                    warn!(text = %text.trim(), "Points display is not numeric");
                }
                value
            }
            Err(e) => {
                warn!(error = %e, "Failed to read points display");
                PointsValue::Unknown
            }
        }
    }

    pub async fn record(&mut self, session: &Session, checkpoint: Checkpoint) -> PointsSnapshot {
        let value = self.read_current(session).await;
        self.record_value(checkpoint, value)
    }

    /// Record a value obtained elsewhere, e.g. carrying a checkpoint forward unchanged.
    pub fn record_value(&mut self, checkpoint: Checkpoint, value: PointsValue) -> PointsSnapshot {
        if let (Some(previous), Some(current)) = (
            self.snapshots.iter().rev().find_map(|s| s.value.known()),
            value.known(),
        ) {
            if current < previous {
                warn!(
                    ?checkpoint,
                    previous, current, "Points decreased between checkpoints"
                );
            }
        }
        let snapshot = PointsSnapshot {
            checkpoint,
            value,
            captured_at: Utc::now(),
        };
        info!(?checkpoint, %value, "Recorded points checkpoint");
        self.snapshots.push(snapshot.clone());
        snapshot
    }

    /// Latest snapshot recorded for `checkpoint`.
    pub fn snapshot(&self, checkpoint: Checkpoint) -> Option<&PointsSnapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.checkpoint == checkpoint)
    }

    pub fn value(&self, checkpoint: Checkpoint) -> PointsValue {
        self.snapshot(checkpoint)
            .map(|s| s.value)
            .unwrap_or(PointsValue::Unknown)
    }

    pub fn delta(&self, from: Checkpoint, to: Checkpoint) -> PointsDelta {
        self.value(from).delta_to(self.value(to))
    }

    pub fn snapshots(&self) -> &[PointsSnapshot] {
        &self.snapshots
    }

    /// Poll the display until it differs from the `from` checkpoint, then record `to`.
    ///
    /// Refreshes the page between polls. When `max_polls` run out, `settled` is
    /// false and the last reading is recorded, unless it is a changed value still
    /// awaiting confirmation, in which case the baseline is kept. Unknown
    /// readings never count as a change.
    pub async fn reconcile(
        &mut self,
        session: &Session,
        from: Checkpoint,
        to: Checkpoint,
        policy: &ReconcilePolicy,
    ) -> Reconciliation {
        let baseline = self.value(from);
        let max_polls = policy.max_polls.max(1);
        let mut last = PointsValue::Unknown;
        let mut candidate: Option<(u64, u32)> = None;
        let mut accepted = None;
        let mut polls = 0;

        while polls < max_polls {
            polls += 1;
            let reading = self.read_current(session).await;
            last = reading;

            if let Some(current) = reading.known() {
                if Some(current) != baseline.known() {
                    let confirmations = match candidate {
                        Some((value, seen)) if value == current => seen + 1,
                        _ => 0,
                    };
                    candidate = Some((current, confirmations));
                    if confirmations >= policy.confirm_reads {
                        accepted = Some(reading);
                        break;
                    }
                } else {
                    candidate = None;
                }
            }

            if polls < max_polls {
                info!(poll = polls, max_polls, "Points not updated yet, waiting");
                tokio::time::sleep(policy.poll_delay()).await;
                if let Err(e) = session.driver().refresh().await {
                    warn!(error = %e, "Refresh between polls failed");
                }
                session.pause(&session.pacing().navigation).await;
            }
        }

        let settled = accepted.is_some();
        let value = match (accepted, candidate) {
            (Some(value), _) => value,
            (None, Some((pending, _))) => {
                warn!(unconfirmed = pending, "Discarding unconfirmed points reading");
                baseline
            }
            (None, None) => last,
        };
        if !settled {
            warn!(polls, %value, "Points did not change within the poll budget");
        }
        let snapshot = self.record_value(to, value);
        Reconciliation {
            delta: baseline.delta_to(value),
            snapshot,
            settled,
            polls,
        }
    }
}
