use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::driver::{AutomationDriver, ElementRef};
use crate::errors::AutomationError;
use crate::selector::Selector;

// Pause between full passes over the candidates while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Ordered alternatives for one logical UI target. Order encodes preference:
/// the first candidate with a visible match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorCandidateSet {
    pub name: String,
    pub candidates: Vec<Selector>,
}

impl LocatorCandidateSet {
    pub fn new<I, S>(name: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selector>,
    {
        Self {
            name: name.into(),
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(name: impl Into<String>, selector: impl Into<Selector>) -> Self {
        Self::new(name, [selector.into()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Element found by [`LocatorResolver::resolve`], with the candidate that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub element: ElementRef,
    pub selector: Selector,
    pub candidate_index: usize,
}

/// Read-only probe turning a candidate set into the first visible element.
///
/// Waits up to a timeout but never retries on its own beyond that: retry
/// policy belongs to the caller.
#[derive(Clone, Copy)]
pub struct LocatorResolver<'a> {
    driver: &'a dyn AutomationDriver,
}

impl<'a> LocatorResolver<'a> {
    pub fn new(driver: &'a dyn AutomationDriver) -> Self {
        Self { driver }
    }

    /// Return the first visible match, trying candidates in order, until `timeout` elapses.
    /// A zero timeout makes exactly one pass.
    #[instrument(level = "debug", skip(self, candidates), fields(locator = %candidates.name))]
    pub async fn resolve(
        &self,
        candidates: &LocatorCandidateSet,
        timeout: Duration,
    ) -> Result<ResolvedElement, AutomationError> {
        if candidates.is_empty() {
            return Err(AutomationError::InvalidSelector(format!(
                "No candidates configured for '{}'",
                candidates.name
            )));
        }

        let deadline = Instant::now() + timeout;
        loop {
            for (candidate_index, selector) in candidates.iter().enumerate() {
                if let Some(element) = self.probe(selector).await {
                    debug!(%selector, candidate_index, "Resolved element");
                    return Ok(ResolvedElement {
                        element,
                        selector: selector.clone(),
                        candidate_index,
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }

        Err(AutomationError::ElementNotFound(format!(
            "No visible match for '{}' after {timeout:?} ({} candidates tried)",
            candidates.name,
            candidates.len()
        )))
    }

    /// Whether any candidate currently has a visible match. Single pass, no waiting.
    pub async fn any_visible(&self, candidates: &LocatorCandidateSet) -> bool {
        for selector in candidates.iter() {
            if self.probe(selector).await.is_some() {
                return true;
            }
        }
        false
    }

    /// First visible element matched by a single selector. Driver failures count as no match.
    async fn probe(&self, selector: &Selector) -> Option<ElementRef> {
        match selector {
            Selector::Invalid(reason) => {
                debug!(%reason, "Skipping invalid selector");
                None
            }
            Selector::Nth { inner, index } => {
                let element = self.find(inner).await.into_iter().nth(*index)?;
                self.visible(&element).await.then_some(element)
            }
            _ => {
                for element in self.find(selector).await {
                    if self.visible(&element).await {
                        return Some(element);
                    }
                }
                None
            }
        }
    }

    async fn find(&self, selector: &Selector) -> Vec<ElementRef> {
        match self.driver.find_all(selector).await {
            Ok(elements) => elements,
            Err(e) => {
                debug!(%selector, error = %e, "find_all failed");
                Vec::new()
            }
        }
    }

    async fn visible(&self, element: &ElementRef) -> bool {
        match self.driver.is_visible(element).await {
            Ok(visible) => visible,
            Err(e) => {
                debug!(%element, error = %e, "Visibility probe failed");
                false
            }
        }
    }
}
