use std::time::Duration;

use tokio::time::Instant;

/// Minimum spacing between triggered refreshes.
pub const REFRESH_RATE_LIMIT: Duration = Duration::from_secs(15);
/// The monitoring guard ignores a video younger than this.
pub const MIN_VIDEO_AGE: Duration = Duration::from_secs(5);

/// Where the monitor currently is in its detect/refresh/restore cycle.
/// One phase value replaces the independent `adDetected`/`cooldownActive`
/// flags so no invalid combination is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// Grace period after script start; nothing runs yet.
    Idle,
    /// Detection passes are allowed.
    Monitoring,
    /// An ad was confirmed; the reload is scheduled or underway.
    Refreshing,
    /// A resume handoff is being applied to the reloaded page.
    Restoring,
    /// Post-trigger/post-restore window during which new confirmations are
    /// suppressed.
    Cooldown,
}

/// Per-page-load detection state. Lives behind a mutex; every transition is
/// a single guarded compare-and-set, so a mutation-driven and an
/// interval-driven pass cannot both confirm the same ad.
#[derive(Debug, Clone)]
pub struct DetectionState {
    phase: MonitorPhase,
    /// Whether the startup grace period has already elapsed. A restore can
    /// begin before it has; an abort then returns to Idle and waits for the
    /// grace timer rather than skipping it.
    grace_elapsed: bool,
    video_loaded_at: Instant,
    last_refresh_at: Option<Instant>,
}

impl DetectionState {
    pub fn new(now: Instant) -> Self {
        Self {
            phase: MonitorPhase::Idle,
            grace_elapsed: false,
            video_loaded_at: now,
            last_refresh_at: None,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn video_age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.video_loaded_at)
    }

    /// Called when the watcher sees a genuinely new video, not a refresh of
    /// the same one.
    pub fn reset_video_start(&mut self, now: Instant) {
        self.video_loaded_at = now;
    }

    /// End of the startup grace period. If a restore is in flight the phase
    /// stays put; an eventual abort picks Monitoring up from here.
    pub fn begin_monitoring(&mut self) {
        self.grace_elapsed = true;
        if self.phase == MonitorPhase::Idle {
            self.phase = MonitorPhase::Monitoring;
        }
    }

    /// Guard chain evaluated before each detection pass.
    pub fn can_check(&self, now: Instant) -> bool {
        self.phase == MonitorPhase::Monitoring
            && self.video_age(now) >= MIN_VIDEO_AGE
            && self.refresh_spacing_ok(now)
    }

    /// At most one refresh per [`REFRESH_RATE_LIMIT`] window; a state that
    /// never refreshed passes trivially.
    fn refresh_spacing_ok(&self, now: Instant) -> bool {
        self.last_refresh_at
            .map_or(true, |at| now.saturating_duration_since(at) >= REFRESH_RATE_LIMIT)
    }

    /// Confirmed-ad transition. Fails when another path already confirmed,
    /// a cooldown is in effect, or the rate limit has not elapsed.
    pub fn try_confirm(&mut self, now: Instant) -> bool {
        if self.phase != MonitorPhase::Monitoring || !self.refresh_spacing_ok(now) {
            return false;
        }
        self.phase = MonitorPhase::Refreshing;
        self.last_refresh_at = Some(now);
        true
    }

    /// Entering the restore routine on a freshly loaded page (or after an
    /// in-page navigation with a pending handoff).
    pub fn begin_restore(&mut self) -> bool {
        match self.phase {
            MonitorPhase::Idle | MonitorPhase::Monitoring | MonitorPhase::Cooldown => {
                self.phase = MonitorPhase::Restoring;
                true
            }
            MonitorPhase::Refreshing | MonitorPhase::Restoring => false,
        }
    }

    /// Restore failed or was abandoned; monitoring resumes with no cooldown,
    /// unless the startup grace period is still running.
    pub fn abort_restore(&mut self) {
        if self.phase == MonitorPhase::Restoring {
            self.phase = if self.grace_elapsed {
                MonitorPhase::Monitoring
            } else {
                MonitorPhase::Idle
            };
        }
    }

    pub fn enter_cooldown(&mut self) {
        self.phase = MonitorPhase::Cooldown;
    }

    pub fn release_cooldown(&mut self) {
        if self.phase == MonitorPhase::Cooldown {
            self.phase = MonitorPhase::Monitoring;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitoring(now: Instant) -> DetectionState {
        let mut state = DetectionState::new(now);
        state.begin_monitoring();
        state
    }

    #[test]
    fn confirm_is_rate_limited_to_one_per_window() {
        let start = Instant::now();
        let mut state = monitoring(start);

        assert!(state.try_confirm(start));
        // Back in Monitoring (as after an aborted reload), still inside the
        // 15s window: refused.
        state.phase = MonitorPhase::Monitoring;
        assert!(!state.try_confirm(start + Duration::from_secs(14)));
        assert!(state.try_confirm(start + REFRESH_RATE_LIMIT));
    }

    #[test]
    fn confirm_requires_the_monitoring_phase() {
        let now = Instant::now();
        let mut state = DetectionState::new(now);
        assert!(!state.try_confirm(now));

        state.begin_monitoring();
        assert!(state.try_confirm(now));
        // Already refreshing: a racing pass loses.
        assert!(!state.try_confirm(now));
    }

    #[test]
    fn guard_chain_enforces_video_age_and_spacing() {
        let start = Instant::now();
        let mut state = monitoring(start);

        assert!(!state.can_check(start + Duration::from_secs(4)));
        assert!(state.can_check(start + MIN_VIDEO_AGE));

        assert!(state.try_confirm(start + MIN_VIDEO_AGE));
        state.phase = MonitorPhase::Monitoring;
        assert!(!state.can_check(start + Duration::from_secs(10)));
        assert!(state.can_check(start + Duration::from_secs(25)));
    }

    #[test]
    fn restore_transitions_and_cooldown_release() {
        let now = Instant::now();
        let mut state = DetectionState::new(now);

        assert!(state.begin_restore());
        assert!(!state.begin_restore());
        state.enter_cooldown();
        assert_eq!(state.phase(), MonitorPhase::Cooldown);
        assert!(!state.can_check(now + Duration::from_secs(60)));

        state.release_cooldown();
        assert_eq!(state.phase(), MonitorPhase::Monitoring);
    }

    #[test]
    fn abort_restore_resumes_monitoring_without_cooldown() {
        let now = Instant::now();
        let mut state = monitoring(now);
        assert!(state.begin_restore());
        state.abort_restore();
        assert_eq!(state.phase(), MonitorPhase::Monitoring);

        // Aborting outside Restoring is a no-op.
        state.enter_cooldown();
        state.abort_restore();
        assert_eq!(state.phase(), MonitorPhase::Cooldown);
    }

    #[test]
    fn abort_restore_during_startup_grace_returns_to_idle() {
        let now = Instant::now();
        let mut state = DetectionState::new(now);
        assert!(state.begin_restore());
        state.abort_restore();
        // The grace timer has not fired yet; detection must stay off.
        assert_eq!(state.phase(), MonitorPhase::Idle);
        assert!(!state.can_check(now + Duration::from_secs(60)));

        state.begin_monitoring();
        assert_eq!(state.phase(), MonitorPhase::Monitoring);
    }

    #[test]
    fn grace_elapsing_mid_restore_is_picked_up_on_abort() {
        let now = Instant::now();
        let mut state = DetectionState::new(now);
        assert!(state.begin_restore());
        // The grace timer fires while the restore is in flight.
        state.begin_monitoring();
        assert_eq!(state.phase(), MonitorPhase::Restoring);

        state.abort_restore();
        assert_eq!(state.phase(), MonitorPhase::Monitoring);
    }

    #[test]
    fn reset_video_start_restarts_the_age_clock() {
        let start = Instant::now();
        let mut state = monitoring(start);
        let later = start + Duration::from_secs(30);
        assert!(state.can_check(later));

        state.reset_video_start(later);
        assert!(!state.can_check(later + Duration::from_secs(2)));
        assert!(state.can_check(later + MIN_VIDEO_AGE));
    }
}
