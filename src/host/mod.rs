//! Simulated browser host: the external collaborator providing tabs,
//! key-value storage areas, message passing, and badge chrome.

mod bus;
mod storage;
mod tab;

pub use bus::{Envelope, Message, Reply, RuntimeBus};
pub use storage::{
    LocalStore, SessionStore, KEY_ADS_BLOCKED, KEY_ENABLED, KEY_LAST_RESET, KEY_RESUME_SECONDS,
    KEY_RESUME_URL, KEY_SMART_DETECTION,
};
pub use tab::{
    DomNode, MediaState, NavigationEvent, Notification, PageEvent, PageSnapshot, Tab, TabId,
};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub text: String,
    pub color: String,
}

/// Tab registry plus the per-tab badge surface.
#[derive(Clone)]
pub struct Browser {
    tabs: Arc<RwLock<HashMap<TabId, Tab>>>,
    active_tab: Arc<RwLock<Option<TabId>>>,
    badges: Arc<RwLock<HashMap<TabId, Badge>>>,
    nav_tx: mpsc::Sender<NavigationEvent>,
}

impl Browser {
    /// Returns the browser handle and the completed-navigation feed.
    pub fn new() -> (Self, mpsc::Receiver<NavigationEvent>) {
        let (nav_tx, nav_rx) = mpsc::channel(32);
        (
            Self {
                tabs: Arc::new(RwLock::new(HashMap::new())),
                active_tab: Arc::new(RwLock::new(None)),
                badges: Arc::new(RwLock::new(HashMap::new())),
                nav_tx,
            },
            nav_rx,
        )
    }

    /// Opens a tab, focuses it, and announces the completed navigation.
    pub async fn open_tab(&self, url: &str) -> Tab {
        let tab = Tab::new(url, self.nav_tx.clone());
        self.tabs.write().unwrap().insert(tab.id(), tab.clone());
        *self.active_tab.write().unwrap() = Some(tab.id());

        let _ = self
            .nav_tx
            .send(NavigationEvent {
                tab_id: tab.id(),
                url: url.to_string(),
            })
            .await;
        tab
    }

    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.tabs.read().unwrap().get(&id).cloned()
    }

    pub fn active_tab(&self) -> Option<Tab> {
        let active = (*self.active_tab.read().unwrap())?;
        self.tab(active)
    }

    pub fn set_badge(&self, tab_id: TabId, text: String, color: &str) {
        self.badges.write().unwrap().insert(
            tab_id,
            Badge {
                text,
                color: color.to_string(),
            },
        );
    }

    pub fn badge(&self, tab_id: TabId) -> Option<Badge> {
        self.badges.read().unwrap().get(&tab_id).cloned()
    }
}
