//! Read-only stats popup: shows the daily count while open, re-polling every
//! few seconds, with a status line chosen from the active tab's URL.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::warn;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::counter;
use crate::host::{Browser, LocalStore};
use crate::site;

const REFRESH_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    WatchingVideo,
    OnSiteIdle,
    OffSite,
}

impl PanelStatus {
    pub fn for_url(url: Option<&str>) -> Self {
        match url {
            Some(url) if site::is_watch_page(url) => PanelStatus::WatchingVideo,
            Some(url) if site::is_host_site(url) => PanelStatus::OnSiteIdle,
            _ => PanelStatus::OffSite,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PanelStatus::WatchingVideo => "Monitoring this video for ads",
            PanelStatus::OnSiteIdle => "Ready! Open a video to start monitoring",
            PanelStatus::OffSite => "Visit the video site to start ad blocking",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub ads_blocked: u64,
    pub status: PanelStatus,
}

pub struct StatsPanel {
    browser: Browser,
    storage: LocalStore,
    view: Arc<RwLock<PanelView>>,
}

impl StatsPanel {
    pub fn new(browser: Browser, storage: LocalStore) -> Self {
        Self {
            browser,
            storage,
            view: Arc::new(RwLock::new(PanelView {
                ads_blocked: 0,
                status: PanelStatus::OffSite,
            })),
        }
    }

    pub fn view(&self) -> PanelView {
        self.view.read().unwrap().clone()
    }

    /// One render pass: counter read (with the same day-rollover reset every
    /// read path applies) plus status selection. A failed read shows zero.
    pub fn refresh(&self) {
        let ads_blocked = counter::load_with_rollover(&self.storage, &counter::today_string())
            .unwrap_or_else(|err| {
                warn!("failed to load stats: {err:#}");
                0
            });

        let active_url = self.browser.active_tab().map(|tab| tab.url());
        let status = PanelStatus::for_url(active_url.as_deref());

        *self.view.write().unwrap() = PanelView {
            ads_blocked,
            status,
        };
    }

    /// Runs while the popup is open; cancel the token when it closes.
    pub async fn open(&self, closed: CancellationToken) {
        self.refresh();

        let mut ticker = time::interval(REFRESH_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // the immediate tick was the initial refresh

        loop {
            tokio::select! {
                _ = closed.cancelled() => break,
                _ = ticker.tick() => self.refresh(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{KEY_ADS_BLOCKED, KEY_LAST_RESET};
    use serde_json::json;

    #[test]
    fn status_selection_covers_the_three_cases() {
        assert_eq!(
            PanelStatus::for_url(Some("https://www.youtube.com/watch?v=abc")),
            PanelStatus::WatchingVideo
        );
        assert_eq!(
            PanelStatus::for_url(Some("https://www.youtube.com/feed/trending")),
            PanelStatus::OnSiteIdle
        );
        assert_eq!(
            PanelStatus::for_url(Some("https://example.com/")),
            PanelStatus::OffSite
        );
        assert_eq!(PanelStatus::for_url(None), PanelStatus::OffSite);
    }

    #[tokio::test]
    async fn refresh_applies_day_rollover_on_read() {
        let storage = LocalStore::in_memory();
        storage
            .set_many(&[
                (KEY_ADS_BLOCKED, json!(7)),
                (KEY_LAST_RESET, json!("Sun Aug 24 2025")),
            ])
            .unwrap();
        let (browser, _nav_rx) = Browser::new();
        let panel = StatsPanel::new(browser, storage.clone());

        panel.refresh();
        assert_eq!(panel.view().ads_blocked, 0);
        assert_eq!(
            storage.get_string(KEY_LAST_RESET).as_deref(),
            Some(counter::today_string().as_str())
        );
    }

    #[tokio::test]
    async fn refresh_reports_the_active_tab_status() {
        let storage = LocalStore::in_memory();
        let (browser, _nav_rx) = Browser::new();
        let panel = StatsPanel::new(browser.clone(), storage);

        panel.refresh();
        assert_eq!(panel.view().status, PanelStatus::OffSite);

        browser.open_tab("https://www.youtube.com/watch?v=abc").await;
        panel.refresh();
        assert_eq!(panel.view().status, PanelStatus::WatchingVideo);
    }
}
