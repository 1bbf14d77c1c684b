use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inclusive millisecond range a randomized pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self::from_millis(min * 1000, max * 1000)
    }

    pub const fn zero() -> Self {
        Self::from_millis(0, 0)
    }

    pub fn sample(&self) -> Duration {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        if lo == hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

/// Fixed inter-action delays of an account workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingPolicy {
    /// After scrolling or clicking a control.
    pub action: DelayRange,
    /// After navigating, refreshing or submitting a form.
    pub navigation: DelayRange,
    /// After dismissing a dialog.
    pub dialog: DelayRange,
    /// Between a successful check-in and reading the new balance.
    pub check_in_settle: DelayRange,
    /// Between share attempts.
    pub between_shares: DelayRange,
    /// Between overall share rounds when the share surface would not open.
    pub between_share_rounds: DelayRange,
    /// After the campaign, before reconciling the balance.
    pub share_settle: DelayRange,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            action: DelayRange::from_secs(2, 3),
            navigation: DelayRange::from_secs(4, 6),
            dialog: DelayRange::from_secs(1, 2),
            check_in_settle: DelayRange::from_secs(3, 5),
            between_shares: DelayRange::from_secs(2, 4),
            between_share_rounds: DelayRange::from_secs(4, 6),
            share_settle: DelayRange::from_secs(10, 15),
        }
    }
}

impl PacingPolicy {
    /// No pauses at all; useful against local fixtures.
    pub fn immediate() -> Self {
        Self {
            action: DelayRange::zero(),
            navigation: DelayRange::zero(),
            dialog: DelayRange::zero(),
            check_in_settle: DelayRange::zero(),
            between_shares: DelayRange::zero(),
            between_share_rounds: DelayRange::zero(),
            share_settle: DelayRange::zero(),
        }
    }
}
