//! Where things are on the target site: routes, markers and locator candidates.

use serde::{Deserialize, Serialize};

use crate::locator::LocatorCandidateSet;
use crate::selector::Selector;
use crate::share::{Channel, ChannelTarget};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Origin of the site, e.g. `https://example.com`. Must be configured.
    pub base_url: String,
    pub home_path: String,
    pub rewards_path: String,
    pub news_path: String,
    /// Text that appears on the news page once it has rendered.
    pub news_ready_marker: String,
    pub locators: SiteLocators,
    /// Share channels in round-robin order.
    pub channels: Vec<ChannelTarget>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            home_path: "/#/".to_string(),
            rewards_path: "/#/pointsCenter/".to_string(),
            news_path: "/#/message/news".to_string(),
            news_ready_marker: "Weekly News Highlights".to_string(),
            locators: SiteLocators::default(),
            channels: Channel::ALL.iter().map(|c| c.default_target()).collect(),
        }
    }
}

impl SiteProfile {
    /// Join `path` onto the base URL without doubling the slash.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            return base.to_string();
        }
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn home_url(&self) -> String {
        self.url(&self.home_path)
    }

    pub fn rewards_url(&self) -> String {
        self.url(&self.rewards_path)
    }

    pub fn news_url(&self) -> String {
        self.url(&self.news_path)
    }
}

/// Candidate sets for every logical control the workflow touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteLocators {
    pub dialog_close: LocatorCandidateSet,
    pub sign_in: LocatorCandidateSet,
    pub username_input: LocatorCandidateSet,
    pub password_input: LocatorCandidateSet,
    pub login_submit: LocatorCandidateSet,
    /// Also serves as the authenticated marker after login.
    pub points_display: LocatorCandidateSet,
    pub check_in_done: LocatorCandidateSet,
    pub check_in_button: LocatorCandidateSet,
    pub share_dialog: LocatorCandidateSet,
    pub share_trigger: LocatorCandidateSet,
}

impl Default for SiteLocators {
    fn default() -> Self {
        Self {
            dialog_close: LocatorCandidateSet::new(
                "dialog_close",
                [
                    "css:svg.icon.close-img",
                    "css:svg.icon.close",
                    "css:.el-dialog__close",
                    "css:button.el-dialog__headerbtn",
                    "css:.close-button",
                    "css:[aria-label='Close']",
                ],
            ),
            sign_in: LocatorCandidateSet::new(
                "sign_in",
                [
                    "xpath://div[contains(., 'Sign in') and contains(@class, 'baseFontColor left')]",
                    "css:.baseFontColor.left",
                    "link:Sign in",
                    "partiallink:Sign",
                ],
            ),
            username_input: LocatorCandidateSet::single(
                "username_input",
                Selector::xpath("//input[@placeholder='Email']"),
            ),
            password_input: LocatorCandidateSet::single(
                "password_input",
                Selector::xpath("//input[@placeholder='Password']"),
            ),
            login_submit: LocatorCandidateSet::single(
                "login_submit",
                Selector::xpath("//button[span[text()='Login']]"),
            ),
            points_display: LocatorCandidateSet::new(
                "points_display",
                [
                    "css:div.pointDisplay.greenColor div.text",
                    "xpath://div[contains(@class, 'pointDisplay')]//div[contains(@class, 'text')]",
                ],
            ),
            check_in_done: LocatorCandidateSet::single(
                "check_in_done",
                Selector::xpath(
                    "//div[contains(@class, 'rightBtn')]//div[contains(text(), 'Checked') or contains(text(), 'checked')]",
                ),
            ),
            check_in_button: LocatorCandidateSet::new(
                "check_in_button",
                [
                    "xpath://div[contains(@class, 'rightBtn')]//div[contains(@class, 'centerBtn') and contains(text(), 'Check In')]",
                    "css:div.rightBtn div.centerBtn",
                    "xpath://div[contains(text(), 'Check In')]",
                ],
            ),
            share_dialog: LocatorCandidateSet::single(
                "share_dialog",
                Selector::css("div[data-v-8acae2bc]"),
            ),
            // The first share box belongs to the page header; the article's is the second
            share_trigger: LocatorCandidateSet::new(
                "share_trigger",
                [
                    "classname:shareBox >> nth=1",
                    "css:.shareBox >> nth=1",
                    "xpath://div[contains(@class, 'shareBox')] >> nth=1",
                    "css:[class*='shareBox'] >> nth=1",
                ],
            ),
        }
    }
}
