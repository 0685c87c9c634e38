//! Session-wide coordinator: seeds defaults on install, (re-)injects
//! monitors into watch-page tabs, answers the message bus, renders the
//! badge, and runs the hourly counter maintenance.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use serde_json::json;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::counter;
use crate::host::{
    Browser, Envelope, LocalStore, Message, NavigationEvent, Reply, RuntimeBus, Tab, TabId,
    KEY_ADS_BLOCKED, KEY_ENABLED, KEY_LAST_RESET, KEY_SMART_DETECTION,
};
use crate::monitor::MonitorController;
use crate::settings::Settings;
use crate::site;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// A tab that does not answer within this window has no monitor running.
const PING_TIMEOUT: Duration = Duration::from_millis(500);
const BADGE_COLOR: &str = "#4CAF50";

pub struct ServiceCoordinator {
    browser: Browser,
    storage: LocalStore,
    bus: RuntimeBus,
    monitors: Mutex<HashMap<TabId, MonitorController>>,
}

impl ServiceCoordinator {
    pub fn new(browser: Browser, storage: LocalStore, bus: RuntimeBus) -> Self {
        Self {
            browser,
            storage,
            bus,
            monitors: Mutex::new(HashMap::new()),
        }
    }

    /// First-install seeding. Existing state is left alone so an upgrade
    /// keeps the user's counter and toggles.
    pub fn install(&self) -> Result<()> {
        if self.storage.contains(KEY_ENABLED) {
            return Ok(());
        }
        self.storage.set_many(&[
            (KEY_ENABLED, json!(true)),
            (KEY_SMART_DETECTION, json!(true)),
            (KEY_ADS_BLOCKED, json!(0)),
            (KEY_LAST_RESET, json!(counter::today_string())),
        ])?;
        info!("default settings initialized");
        Ok(())
    }

    pub async fn run(
        &self,
        mut navigations: mpsc::Receiver<NavigationEvent>,
        mut requests: mpsc::Receiver<Envelope>,
        cancel: CancellationToken,
    ) {
        let mut maintenance = time::interval_at(
            Instant::now() + MAINTENANCE_INTERVAL,
            MAINTENANCE_INTERVAL,
        );
        maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("coordinator shutting down");
                    break;
                }
                Some(navigation) = navigations.recv() => {
                    self.handle_navigation(navigation).await;
                }
                Some(envelope) = requests.recv() => {
                    self.handle_request(envelope);
                }
                _ = maintenance.tick() => {
                    self.run_maintenance();
                }
            }
        }

        self.stop_all_monitors().await;
    }

    /// Completed navigation to a watch page: ping for a live monitor and
    /// inject one when nothing answers. Makes injection idempotent and
    /// self-healing across reloads.
    async fn handle_navigation(&self, navigation: NavigationEvent) {
        if !site::is_watch_page(&navigation.url) {
            return;
        }
        let Some(tab) = self.browser.tab(navigation.tab_id) else {
            return;
        };

        if self.ping(&tab).await {
            debug!("monitor already active on tab {}", tab.id());
            return;
        }

        if let Err(err) = self.inject(tab).await {
            warn!("failed to inject monitor: {err:#}");
        }
    }

    async fn ping(&self, tab: &Tab) -> bool {
        let Some(sender) = tab.content_sender() else {
            return false;
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            sender: None,
            message: Message::Ping,
            reply: reply_tx,
        };
        if sender.send(envelope).await.is_err() {
            return false;
        }
        matches!(
            time::timeout(PING_TIMEOUT, reply_rx).await,
            Ok(Ok(Reply::Ping { success: true, .. }))
        )
    }

    async fn inject(&self, tab: Tab) -> Result<()> {
        let tab_id = tab.id();
        let mut monitors = self.monitors.lock().await;

        // A stale controller for this tab belongs to the unloaded document.
        if let Some(mut old) = monitors.remove(&tab_id) {
            let _ = old.stop().await;
        }

        let mut controller = MonitorController::new();
        controller.start(tab, self.storage.clone(), self.bus.clone())?;
        monitors.insert(tab_id, controller);
        info!("monitor injected into tab {tab_id}");
        Ok(())
    }

    fn handle_request(&self, envelope: Envelope) {
        match envelope.message {
            Message::AdBlocked { count } => {
                if let Some(tab_id) = envelope.sender {
                    self.update_badge(tab_id, Some(count));
                }
                let _ = envelope.reply.send(Reply::AdBlocked {
                    success: true,
                    count,
                });
            }
            Message::GetSettings => {
                let settings = Settings::load(&self.storage);
                let _ = envelope.reply.send(Reply::Settings {
                    enabled: settings.enabled,
                    smart_detection: settings.smart_detection,
                });
            }
            Message::Ping => {
                let _ = envelope.reply.send(Reply::Ping {
                    success: true,
                    enabled: true,
                    smart: true,
                    status: "active".to_string(),
                });
            }
        }
    }

    /// Tab-scoped badge: the numeric count, blank at zero. Without an
    /// explicit count the stored value is used.
    fn update_badge(&self, tab_id: TabId, count: Option<u64>) {
        let count =
            count.unwrap_or_else(|| self.storage.get_u64(KEY_ADS_BLOCKED).unwrap_or(0));
        let text = if count > 0 {
            count.to_string()
        } else {
            String::new()
        };
        self.browser.set_badge(tab_id, text, BADGE_COLOR);
        debug!("badge updated for tab {tab_id}, count {count}");
    }

    /// Redundant second path for the day-rollover invariant; the read paths
    /// in the monitor and the stats panel enforce the same reset inline.
    fn run_maintenance(&self) {
        match counter::reset_if_stale(&self.storage, &counter::today_string()) {
            Ok(true) => info!("daily stats reset"),
            Ok(false) => {}
            Err(err) => warn!("daily maintenance failed: {err:#}"),
        }
    }

    async fn stop_all_monitors(&self) {
        let mut monitors = self.monitors.lock().await;
        for (tab_id, mut controller) in monitors.drain() {
            if let Err(err) = controller.stop().await {
                warn!("monitor on tab {tab_id} did not stop cleanly: {err:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_seeds_defaults_once() {
        let storage = LocalStore::in_memory();
        let (browser, _nav_rx) = Browser::new();
        let (bus, _bus_rx) = RuntimeBus::channel(4);
        let coordinator = ServiceCoordinator::new(browser, storage.clone(), bus);

        coordinator.install().unwrap();
        assert_eq!(storage.get_bool(KEY_ENABLED), Some(true));
        assert_eq!(storage.get_u64(KEY_ADS_BLOCKED), Some(0));

        // A second install keeps accumulated state.
        storage.set(KEY_ADS_BLOCKED, json!(5)).unwrap();
        coordinator.install().unwrap();
        assert_eq!(storage.get_u64(KEY_ADS_BLOCKED), Some(5));
    }

    #[tokio::test]
    async fn get_settings_replies_with_stored_values() {
        let storage = LocalStore::in_memory();
        storage.set(KEY_SMART_DETECTION, json!(false)).unwrap();
        let (browser, _nav_rx) = Browser::new();
        let (bus, _bus_rx) = RuntimeBus::channel(4);
        let coordinator = ServiceCoordinator::new(browser, storage, bus);

        let (reply_tx, reply_rx) = oneshot::channel();
        coordinator.handle_request(Envelope {
            sender: None,
            message: Message::GetSettings,
            reply: reply_tx,
        });

        assert_eq!(
            reply_rx.await.unwrap(),
            Reply::Settings {
                enabled: true,
                smart_detection: false,
            }
        );
    }

    #[tokio::test]
    async fn ad_blocked_updates_the_senders_badge() {
        let storage = LocalStore::in_memory();
        let (browser, _nav_rx) = Browser::new();
        let (bus, _bus_rx) = RuntimeBus::channel(4);
        let coordinator = ServiceCoordinator::new(browser.clone(), storage, bus);

        let tab = browser.open_tab("https://www.youtube.com/watch?v=abc").await;
        let (reply_tx, reply_rx) = oneshot::channel();
        coordinator.handle_request(Envelope {
            sender: Some(tab.id()),
            message: Message::AdBlocked { count: 3 },
            reply: reply_tx,
        });

        assert_eq!(
            reply_rx.await.unwrap(),
            Reply::AdBlocked {
                success: true,
                count: 3,
            }
        );
        let badge = browser.badge(tab.id()).unwrap();
        assert_eq!(badge.text, "3");
        assert_eq!(badge.color, BADGE_COLOR);
    }

    #[tokio::test]
    async fn badge_goes_blank_at_zero() {
        let storage = LocalStore::in_memory();
        let (browser, _nav_rx) = Browser::new();
        let (bus, _bus_rx) = RuntimeBus::channel(4);
        let coordinator = ServiceCoordinator::new(browser.clone(), storage, bus);

        let tab = browser.open_tab("https://www.youtube.com/watch?v=abc").await;
        coordinator.update_badge(tab.id(), None);
        assert_eq!(browser.badge(tab.id()).unwrap().text, "");
    }
}
