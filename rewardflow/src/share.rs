//! Quota-driven share campaign over a rotating set of channels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::dialog::DialogDismisser;
use crate::errors::AutomationError;
use crate::interaction::{ActionExecutor, ClickMethod};
use crate::locator::{LocatorCandidateSet, LocatorResolver};
use crate::selector::Selector;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    WeChat,
    Twitter,
    Facebook,
    Weibo,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::WeChat,
        Channel::Twitter,
        Channel::Facebook,
        Channel::Weibo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::WeChat => "WeChat",
            Channel::Twitter => "Twitter",
            Channel::Facebook => "Facebook",
            Channel::Weibo => "Weibo",
        }
    }

    /// The share-dialog control for this channel on the stock site layout.
    pub fn default_target(&self) -> ChannelTarget {
        let selector = match self {
            Channel::WeChat => {
                Selector::xpath("//div[contains(@class, 'linkImg') and contains(@class, 'wx')]")
            }
            other => Selector::xpath(format!(
                "//div[contains(@class, 'linkImg')]/div[normalize-space(text())='{}']/..",
                other.name().to_lowercase()
            )),
        };
        ChannelTarget {
            channel: *self,
            candidates: LocatorCandidateSet::single(self.name(), selector),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTarget {
    pub channel: Channel,
    pub candidates: LocatorCandidateSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareOutcome {
    Success,
    Failure,
}

/// One share attempt, recorded whatever its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareAttempt {
    pub channel: Channel,
    /// Zero-based position in the campaign.
    pub index: u32,
    pub outcome: ShareOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub attempts: Vec<ShareAttempt>,
}

impl CampaignReport {
    pub fn success_count(&self) -> u32 {
        self.attempts
            .iter()
            .filter(|a| a.outcome == ShareOutcome::Success)
            .count() as u32
    }

    pub fn attempts_for(&self, channel: Channel) -> impl Iterator<Item = &ShareAttempt> {
        self.attempts.iter().filter(move |a| a.channel == channel)
    }
}

/// The share dialog and the control that opens it.
pub struct ShareSurface<'a> {
    pub dialog: &'a LocatorCandidateSet,
    pub trigger: &'a LocatorCandidateSet,
    /// Close controls of interstitial dialogs, dismissed after each refresh.
    pub interstitials: &'a LocatorCandidateSet,
    pub open_attempts: u32,
    /// Text that shows the page rendered again after a refresh.
    pub page_marker: &'a str,
    pub marker_timeout: Duration,
    pub control_timeout: Duration,
}

impl ShareSurface<'_> {
    pub async fn is_open(&self, session: &Session) -> bool {
        LocatorResolver::new(session.driver())
            .any_visible(self.dialog)
            .await
    }

    /// Open the surface from the page, refreshing between failed tries.
    #[instrument(level = "debug", skip_all)]
    pub async fn open(&self, session: &Session) -> bool {
        let attempts = self.open_attempts.max(1);
        for attempt in 1..=attempts {
            match self.click_trigger(session).await {
                Ok(method) => {
                    info!(attempt, ?method, "Opened share surface");
                    session.pause(&session.pacing().between_shares).await;
                    return true;
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Share trigger not clickable");
                    session
                        .capture_diagnostics(&format!("share_trigger_attempt{attempt}"))
                        .await;
                }
            }

            if attempt < attempts {
                if let Err(e) = session.driver().refresh().await {
                    warn!(error = %e, "Refresh failed");
                }
                session.pause(&session.pacing().navigation).await;
                DialogDismisser::new(session.driver(), self.interstitials)
                    .dismiss_if_present()
                    .await;
                if !session
                    .wait_for_text(self.page_marker, self.marker_timeout)
                    .await
                {
                    warn!(marker = self.page_marker, "Page marker missing after refresh");
                }
            }
        }
        false
    }

    /// Make sure the surface is open before an attempt, clicking the trigger once if not.
    pub async fn ensure_open(&self, session: &Session) -> bool {
        if self.is_open(session).await {
            return true;
        }
        debug!("Share surface closed, reopening");
        match self.click_trigger(session).await {
            Ok(_) => {
                session.pause(&session.pacing().between_shares).await;
                self.is_open(session).await
            }
            Err(e) => {
                warn!(error = %e, "Could not reopen share surface");
                false
            }
        }
    }

    async fn click_trigger(&self, session: &Session) -> Result<ClickMethod, AutomationError> {
        let driver = session.driver();
        let found = LocatorResolver::new(driver)
            .resolve(self.trigger, self.control_timeout)
            .await?;
        ActionExecutor::new(driver)
            .scroll_and_click(&found.element, &session.pacing().action)
            .await
    }
}

/// Performs exactly `quota` share attempts, round-robin over the channels.
pub struct ShareCampaignRunner<'a> {
    session: &'a Session,
    control_timeout: Duration,
}

impl<'a> ShareCampaignRunner<'a> {
    pub fn new(session: &'a Session, control_timeout: Duration) -> Self {
        Self {
            session,
            control_timeout,
        }
    }

    /// Failures are independent: a failed attempt never skips or stops later ones.
    #[instrument(level = "info", skip_all, fields(quota = quota))]
    pub async fn run(
        &self,
        quota: u32,
        channels: &[ChannelTarget],
        surface: &ShareSurface<'_>,
    ) -> CampaignReport {
        let mut report = CampaignReport::default();
        if channels.is_empty() {
            warn!("No share channels configured");
            return report;
        }

        for index in 0..quota {
            let target = &channels[index as usize % channels.len()];
            let channel = target.channel;
            info!(attempt = index + 1, quota, %channel, "Share attempt");

            if !surface.ensure_open(self.session).await {
                warn!(%channel, "Share surface not open, trying the channel anyway");
            }

            let attempt = match self.click_channel(target).await {
                Ok(method) => {
                    info!(%channel, ?method, attempt = index + 1, "Shared");
                    ShareAttempt {
                        channel,
                        index,
                        outcome: ShareOutcome::Success,
                        detail: None,
                    }
                }
                Err(e) => {
                    warn!(%channel, attempt = index + 1, error = %e, "Share attempt failed");
                    self.session
                        .capture_diagnostics(&format!("share_failure_{channel}"))
                        .await;
                    ShareAttempt {
                        channel,
                        index,
                        outcome: ShareOutcome::Failure,
                        detail: Some(e.to_string()),
                    }
                }
            };
            report.attempts.push(attempt);

            self.session
                .pause(&self.session.pacing().between_shares)
                .await;
        }

        info!(
            successes = report.success_count(),
            quota, "Share campaign finished"
        );
        report
    }

    async fn click_channel(&self, target: &ChannelTarget) -> Result<ClickMethod, AutomationError> {
        let driver = self.session.driver();
        let found = LocatorResolver::new(driver)
            .resolve(&target.candidates, self.control_timeout)
            .await?;
        ActionExecutor::new(driver)
            .scroll_and_click(&found.element, &self.session.pacing().action)
            .await
    }
}
