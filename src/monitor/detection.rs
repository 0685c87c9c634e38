//! Heuristic ad detection over a page snapshot.
//!
//! A provisional match comes from either an ordered selector scan or a scan
//! for reliable text fragments in the player container. It only counts once
//! validation corroborates it with at least two independent indicators.

use std::time::Duration;

use log::debug;

use crate::host::{DomNode, PageSnapshot};

/// Media longer than this is presumed to be main content, not an ad.
pub const MAX_AD_DURATION_SECS: f64 = 300.0;
/// Validation refuses to confirm anything this soon after the video started.
pub const MIN_VALIDATION_AGE: Duration = Duration::from_secs(8);
/// Matches below this many corroborating indicators are treated as false
/// positives.
pub const MIN_INDICATORS: usize = 2;

/// Text fragments that only ever appear inside the player during an ad.
pub const RELIABLE_AD_TEXTS: [&str; 3] = [
    "Skip ad",
    "You can skip this ad in",
    "Video will play after ad",
];

const AD_BADGE_TEXT: &str = "Ad •";

/// Class names whose arrival in the DOM confirms an ad directly, without a
/// second scan or validation pass.
pub const DIRECT_TRIGGER_CLASSES: [&str; 7] = [
    "ytp-ad-module",
    "video-ads",
    "ytp-ad-overlay-container",
    "ad-showing",
    "ad-container",
    "ytp-ad-skip-button-container",
    "ytp-ad-player-overlay",
];

/// Ordered from most to least reliable. Every arm requires the matched
/// element to be visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdSelector {
    SkipButtonContainer,
    AdText,
    OverlayInstreamInfo,
    AdModuleInVideoAds,
    VisibleOverlayContainer,
}

pub const AD_SELECTORS: [AdSelector; 5] = [
    AdSelector::SkipButtonContainer,
    AdSelector::AdText,
    AdSelector::OverlayInstreamInfo,
    AdSelector::AdModuleInVideoAds,
    AdSelector::VisibleOverlayContainer,
];

impl AdSelector {
    pub fn matches(&self, page: &PageSnapshot) -> bool {
        match self {
            AdSelector::SkipButtonContainer => {
                visible_node(page, "ytp-ad-skip-button-container").is_some()
            }
            // Ad text, but not the pre-roll preview countdown.
            AdSelector::AdText => visible_node(page, "ytp-ad-text")
                .is_some_and(|node| !node.has_class("ytp-ad-preview-text")),
            AdSelector::OverlayInstreamInfo => {
                visible_node(page, "ytp-ad-player-overlay-instream-info").is_some()
            }
            AdSelector::AdModuleInVideoAds => visible_node(page, "ytp-ad-module")
                .is_some_and(|node| node.has_ancestor_class("video-ads")),
            AdSelector::VisibleOverlayContainer => {
                visible_node(page, "ytp-ad-overlay-container").is_some()
            }
        }
    }
}

/// What a detection pass provisionally matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdMarker {
    Selector(AdSelector),
    Text(&'static str),
}

/// The first selector or reliable text fragment that currently matches.
pub fn find_ad_marker(page: &PageSnapshot) -> Option<AdMarker> {
    for selector in AD_SELECTORS {
        if selector.matches(page) {
            return Some(AdMarker::Selector(selector));
        }
    }
    RELIABLE_AD_TEXTS
        .into_iter()
        .find(|text| player_text_contains(page, text))
        .map(AdMarker::Text)
}

/// Corroboration pass run before any refresh is allowed. Checks the media
/// element, the video's age, the duration ceiling, and that at least
/// [`MIN_INDICATORS`] of the four independent indicators agree.
pub fn validate_detection(page: &PageSnapshot, video_age: Duration) -> bool {
    let Some(media) = &page.media else {
        return false;
    };

    if video_age < MIN_VALIDATION_AGE {
        debug!("skipping detection, too soon after video start");
        return false;
    }

    if let Some(duration) = media.duration {
        if duration > MAX_AD_DURATION_SECS {
            debug!("skipping detection, media too long to be an ad ({duration:.0}s)");
            return false;
        }
    }

    let found = indicator_count(page);
    if found < MIN_INDICATORS {
        debug!("not enough ad indicators found: {found}");
        return false;
    }

    true
}

/// The four independent corroborating signals. Unlike the selector scan these
/// only require presence, not visibility.
pub fn indicator_count(page: &PageSnapshot) -> usize {
    let indicators = [
        any_node(page, "ytp-ad-skip-button-container").is_some(),
        any_node(page, "ytp-ad-text").is_some(),
        player_text_contains(page, "Skip ad"),
        player_text_contains(page, AD_BADGE_TEXT),
    ];
    indicators.into_iter().filter(|found| *found).count()
}

/// Mutation fast path: does an added node carry one of the known ad classes?
pub fn is_direct_ad_trigger(classes: &[String]) -> bool {
    classes
        .iter()
        .any(|class| DIRECT_TRIGGER_CLASSES.contains(&class.as_str()))
}

fn player_text_contains(page: &PageSnapshot, fragment: &str) -> bool {
    page.player_text.contains(fragment)
}

fn any_node<'a>(page: &'a PageSnapshot, class: &str) -> Option<&'a DomNode> {
    page.nodes.iter().find(|node| node.has_class(class))
}

fn visible_node<'a>(page: &'a PageSnapshot, class: &str) -> Option<&'a DomNode> {
    page.nodes
        .iter()
        .find(|node| node.visible && node.has_class(class))
}
