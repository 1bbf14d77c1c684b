use std::time::Duration;
use tokio::time::Instant;

use super::{MockElement, MockPage};
use crate::errors::AutomationError;
use crate::locator::{LocatorCandidateSet, LocatorResolver};
use crate::selector::Selector;

fn three_way_set() -> LocatorCandidateSet {
    LocatorCandidateSet::new("target", ["css:#first", "css:#second", "css:#third"])
}

#[tokio::test(start_paused = true)]
async fn test_resolve_prefers_first_visible_candidate() {
    let page = MockPage::new()
        .with(MockElement::new("third", ["css:#third"]))
        .with(MockElement::new("second", ["css:#second"]));

    let found = LocatorResolver::new(&page)
        .resolve(&three_way_set(), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(found.element.as_str(), "second");
    assert_eq!(found.candidate_index, 1);
    assert_eq!(found.selector, Selector::css("#second"));
    assert!(page.clicks().is_empty(), "resolving must not interact");
}

#[tokio::test(start_paused = true)]
async fn test_hidden_matches_are_skipped() {
    let page = MockPage::new()
        .with(MockElement::new("first", ["css:#first"]).hidden())
        .with(MockElement::new("third", ["css:#third"]));

    let found = LocatorResolver::new(&page)
        .resolve(&three_way_set(), Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(found.element.as_str(), "third");
    assert_eq!(found.candidate_index, 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_set_is_invalid() {
    let page = MockPage::new();
    let empty = LocatorCandidateSet::new("nothing", Vec::<Selector>::new());
    let err = LocatorResolver::new(&page)
        .resolve(&empty, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::InvalidSelector(_)));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reports_not_found() {
    let page = MockPage::new().with(MockElement::new("first", ["css:#first"]).hidden());
    let started = Instant::now();

    let err = LocatorResolver::new(&page)
        .resolve(&three_way_set(), Duration::from_secs(3))
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::ElementNotFound(ref m) if m.contains("target")));
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_candidate_falls_through() {
    let page = MockPage::new().with(MockElement::new("second", ["css:#second"]));
    let set = LocatorCandidateSet::new("target", ["bogus", "css:#second"]);
    let found = LocatorResolver::new(&page)
        .resolve(&set, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(found.element.as_str(), "second");
}

#[tokio::test(start_paused = true)]
async fn test_nth_picks_the_indexed_match() {
    let page = MockPage::new()
        .with(MockElement::new("header_share", ["classname:shareBox"]))
        .with(MockElement::new("article_share", ["classname:shareBox"]));
    let set = LocatorCandidateSet::single("share_trigger", "classname:shareBox >> nth=1");

    let found = LocatorResolver::new(&page)
        .resolve(&set, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(found.element.as_str(), "article_share");
}

#[tokio::test(start_paused = true)]
async fn test_nth_does_not_fall_back_to_other_matches() {
    let page = MockPage::new()
        .with(MockElement::new("header_share", ["classname:shareBox"]))
        .with(MockElement::new("article_share", ["classname:shareBox"]).hidden());
    let set = LocatorCandidateSet::single("share_trigger", "classname:shareBox >> nth=1");

    let resolver = LocatorResolver::new(&page);
    assert!(resolver.resolve(&set, Duration::ZERO).await.is_err());
    assert!(!resolver.any_visible(&set).await);
}

#[tokio::test(start_paused = true)]
async fn test_element_appearing_later_is_found() {
    let page = MockPage::new().with(MockElement::new("late", ["css:#third"]).hidden());
    let handle = page.clone();
    let reveal = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1200)).await;
        handle.reveal("late");
    });

    let found = LocatorResolver::new(&page)
        .resolve(&three_way_set(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(found.element.as_str(), "late");
    reveal.await.unwrap();
}
