//! In-page ad monitor: detection passes, the confirm/refresh state machine,
//! and post-reload playback restoration.

mod controller;
mod detection;
mod restore;
mod state;
mod worker;

pub use controller::MonitorController;
pub use detection::{
    find_ad_marker, indicator_count, is_direct_ad_trigger, validate_detection, AdMarker,
    AdSelector, DIRECT_TRIGGER_CLASSES, MAX_AD_DURATION_SECS, MIN_INDICATORS, RELIABLE_AD_TEXTS,
};
pub use restore::format_time;
pub use state::{DetectionState, MonitorPhase, MIN_VIDEO_AGE, REFRESH_RATE_LIMIT};
