use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::counter;
use crate::host::{
    Envelope, LocalStore, Message, Notification, PageEvent, Reply, RuntimeBus, Tab,
    KEY_RESUME_SECONDS, KEY_RESUME_URL,
};
use crate::site;

use super::detection;
use super::restore;
use super::state::DetectionState;

/// Startup grace before the first detection pass, so page-load transients
/// never trigger.
const GRACE_DELAY: Duration = Duration::from_secs(3);
const CHECK_INTERVAL: Duration = Duration::from_secs(2);
/// The skip notification stays visible for this long before the reload.
const RELOAD_DELAY: Duration = Duration::from_millis(800);
const SKIP_NOTICE_MS: u64 = 1000;

pub(super) async fn monitor_loop(
    tab: Tab,
    storage: LocalStore,
    bus: RuntimeBus,
    state: Arc<Mutex<DetectionState>>,
    mut events: mpsc::Receiver<PageEvent>,
    mut requests: mpsc::Receiver<Envelope>,
    document: CancellationToken,
    stop: CancellationToken,
) {
    info!("monitor attached to tab {}", tab.id());

    // A reload triggered by the skip sequence leaves a handoff behind;
    // restoration runs alongside the loop so pings keep being answered.
    if restore::has_pending_handoff(&tab) {
        tokio::spawn(restore::restore_position(tab.clone(), state.clone()));
    }

    let mut ticker = tokio::time::interval(CHECK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let grace = tokio::time::sleep(GRACE_DELAY);
    tokio::pin!(grace);
    let mut grace_elapsed = false;

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                info!("monitor loop shutting down");
                break;
            }
            _ = document.cancelled() => {
                debug!("document unloaded, monitor loop exiting");
                break;
            }
            _ = &mut grace, if !grace_elapsed => {
                grace_elapsed = true;
                state.lock().await.begin_monitoring();
                info!("monitoring started on tab {}", tab.id());
            }
            _ = ticker.tick() => {
                run_check(&tab, &storage, &bus, &state).await;
            }
            Some(event) = events.recv() => {
                handle_page_event(event, &tab, &storage, &bus, &state).await;
            }
            Some(envelope) = requests.recv() => {
                answer_request(envelope);
            }
        }
    }
}

/// Interval-driven detection pass with the full guard chain.
async fn run_check(
    tab: &Tab,
    storage: &LocalStore,
    bus: &RuntimeBus,
    state: &Arc<Mutex<DetectionState>>,
) {
    let now = Instant::now();
    let video_age = {
        let guard = state.lock().await;
        if !guard.can_check(now) {
            return;
        }
        guard.video_age(now)
    };

    let snapshot = tab.snapshot();
    if !site::is_watch_page(&snapshot.url) {
        return;
    }
    let Some(media) = &snapshot.media else {
        return;
    };
    if media.paused || media.ended {
        return;
    }

    let Some(marker) = detection::find_ad_marker(&snapshot) else {
        return;
    };
    info!("ad detected via {marker:?}");

    if !detection::validate_detection(&snapshot, video_age) {
        return;
    }

    handle_ad_detected(tab, storage, bus, state).await;
}

async fn handle_page_event(
    event: PageEvent,
    tab: &Tab,
    storage: &LocalStore,
    bus: &RuntimeBus,
    state: &Arc<Mutex<DetectionState>>,
) {
    match event {
        // Mutation fast path: a known ad class arriving confirms directly,
        // without the selector scan or validation.
        PageEvent::NodeAdded { classes } => {
            if detection::is_direct_ad_trigger(&classes) {
                info!("ad detected via added node {classes:?}");
                handle_ad_detected(tab, storage, bus, state).await;
            }
        }
        PageEvent::UrlChanged { url } => {
            debug!("in-page navigation to {url}");
            if restore::has_pending_handoff(tab) {
                tokio::spawn(restore::restore_position(tab.clone(), state.clone()));
            } else {
                state.lock().await.reset_video_start(Instant::now());
            }
        }
    }
}

/// Confirmed-ad handling: one atomic phase transition decides the winner
/// among racing passes, then the resume point is captured and the reload
/// scheduled.
async fn handle_ad_detected(
    tab: &Tab,
    storage: &LocalStore,
    bus: &RuntimeBus,
    state: &Arc<Mutex<DetectionState>>,
) {
    if !state.lock().await.try_confirm(Instant::now()) {
        debug!("refresh suppressed, cooldown or rate limit in effect");
        return;
    }

    info!("confirmed ad on tab {}, initiating skip sequence", tab.id());

    let snapshot = tab.snapshot();
    if let Some(media) = &snapshot.media {
        if media.current_time.is_finite() && media.current_time > 0.0 {
            let session = tab.session();
            session.set(KEY_RESUME_SECONDS, media.current_time.to_string());
            session.set(KEY_RESUME_URL, snapshot.url.clone());
            info!("stored resume point {:.2}s", media.current_time);
        }
    }

    tab.notify(Notification {
        message: "Skipping ad...".to_string(),
        duration_ms: SKIP_NOTICE_MS,
    });

    match counter::increment(storage, &counter::today_string()) {
        Ok(count) => {
            info!("blocked-ad counter incremented to {count}");
            if let Err(err) = bus.request(Some(tab.id()), Message::AdBlocked { count }).await {
                warn!("could not report blocked ad: {err:#}");
            }
        }
        Err(err) => error!("failed to increment blocked-ad counter: {err:#}"),
    }

    tokio::time::sleep(RELOAD_DELAY).await;
    tab.reload().await;
}

fn answer_request(envelope: Envelope) {
    match envelope.message {
        Message::Ping => {
            let _ = envelope.reply.send(Reply::Ping {
                success: true,
                enabled: true,
                smart: true,
                status: "active".to_string(),
            });
        }
        // Anything else is not for the content side; dropping the reply slot
        // tells the requester nobody answered.
        _ => {}
    }
}
