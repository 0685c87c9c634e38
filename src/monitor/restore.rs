//! Post-reload playback restoration.
//!
//! A reload triggered by the skip sequence leaves a resume handoff in the
//! tab's session storage. The next monitor instance reads it back, waits for
//! the media element to come up, seeks, and holds a cooldown long enough to
//! outlast the reload cycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::host::{Notification, Tab, KEY_RESUME_SECONDS, KEY_RESUME_URL};

use super::state::DetectionState;

const MEDIA_POLL: Duration = Duration::from_millis(100);
/// Polling for the media element is bounded; running out aborts the restore
/// instead of waiting forever.
const MEDIA_WAIT_TIMEOUT: Duration = Duration::from_secs(15);
/// Longer than a full refresh-reload cycle, so the reloaded page cannot
/// immediately re-trigger.
const COOLDOWN_RELEASE_DELAY: Duration = Duration::from_secs(10);
const RESUME_NOTICE_MS: u64 = 2000;

pub(super) fn has_pending_handoff(tab: &Tab) -> bool {
    tab.session().get(KEY_RESUME_SECONDS).is_some()
}

/// Applies a pending handoff to the current page. The handoff is only
/// consumed when its URL matches this page; a mismatch means the viewer
/// navigated away and the record is stale for us but not ours to delete.
pub(super) async fn restore_position(tab: Tab, state: Arc<Mutex<DetectionState>>) {
    // Claim the Restoring phase first so no detection pass can confirm while
    // the handoff is being applied; a concurrent restore loses here.
    if !state.lock().await.begin_restore() {
        return;
    }

    let session = tab.session();
    let Some(stored) = session.get(KEY_RESUME_SECONDS) else {
        state.lock().await.abort_restore();
        return;
    };

    if session.get(KEY_RESUME_URL).as_deref() != Some(tab.url().as_str()) {
        info!("resume handoff belongs to another page, not restoring");
        state.lock().await.abort_restore();
        return;
    }

    session.remove(KEY_RESUME_SECONDS);
    session.remove(KEY_RESUME_URL);

    let resume_seconds: f64 = stored.parse().unwrap_or(0.0);
    if resume_seconds <= 0.0 {
        state.lock().await.abort_restore();
        return;
    }

    info!("restoring playback position {resume_seconds:.2}s");

    if let Err(err) = wait_for_media_ready(&tab).await {
        warn!("restore abandoned: {err:#}");
        state.lock().await.abort_restore();
        return;
    }

    tab.seek(resume_seconds);
    tab.notify(Notification {
        message: format!("Resumed at {}", format_time(resume_seconds)),
        duration_ms: RESUME_NOTICE_MS,
    });

    state.lock().await.enter_cooldown();
    tokio::time::sleep(COOLDOWN_RELEASE_DELAY).await;
    state.lock().await.release_cooldown();
    info!("refresh cooldown released");
}

/// Waits first for the media element to exist, then for its metadata
/// (readyState >= 2 with a known positive duration), polling at 100ms under
/// a shared deadline.
async fn wait_for_media_ready(tab: &Tab) -> Result<()> {
    let deadline = Instant::now() + MEDIA_WAIT_TIMEOUT;

    while tab.snapshot().media.is_none() {
        if Instant::now() >= deadline {
            bail!("no media element appeared within {MEDIA_WAIT_TIMEOUT:?}");
        }
        tokio::time::sleep(MEDIA_POLL).await;
    }

    loop {
        let ready = tab.snapshot().media.is_some_and(|media| {
            media.ready_state >= 2 && media.duration.is_some_and(|d| d > 0.0)
        });
        if ready {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("media element not ready within {MEDIA_WAIT_TIMEOUT:?}");
        }
        tokio::time::sleep(MEDIA_POLL).await;
    }
}

/// m:ss rendering for the resume notification.
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_renders_minutes_and_padded_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(42.5), "0:42");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(600.0), "10:00");
        assert_eq!(format_time(-3.0), "0:00");
    }
}
