use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::bus::Envelope;
use super::storage::SessionStore;

pub type TabId = Uuid;

/// Flattened stand-in for a DOM element: its own classes, the classes of its
/// ancestor chain, and whether it is currently rendered.
#[derive(Debug, Clone, Default)]
pub struct DomNode {
    pub classes: Vec<String>,
    pub ancestor_classes: Vec<String>,
    pub visible: bool,
}

impl DomNode {
    pub fn new(classes: &[&str]) -> Self {
        Self {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ancestor_classes: Vec::new(),
            visible: true,
        }
    }

    pub fn under(mut self, ancestor_classes: &[&str]) -> Self {
        self.ancestor_classes = ancestor_classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn has_ancestor_class(&self, class: &str) -> bool {
        self.ancestor_classes.iter().any(|c| c == class)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaState {
    pub paused: bool,
    pub ended: bool,
    /// 0 = nothing loaded; >= 2 means metadata (and duration) are known.
    pub ready_state: u8,
    pub duration: Option<f64>,
    pub current_time: f64,
}

impl MediaState {
    pub fn playing(duration: Option<f64>) -> Self {
        Self {
            paused: false,
            ended: false,
            ready_state: 3,
            duration,
            current_time: 0.0,
        }
    }
}

/// Point-in-time view of the page consumed by detection.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub url: String,
    pub nodes: Vec<DomNode>,
    pub player_text: String,
    pub media: Option<MediaState>,
}

/// Mutation/navigation notifications delivered to the in-page observer.
#[derive(Debug, Clone)]
pub enum PageEvent {
    NodeAdded { classes: Vec<String> },
    UrlChanged { url: String },
}

/// Completed top-level navigation, delivered to the session coordinator.
#[derive(Debug, Clone)]
pub struct NavigationEvent {
    pub tab_id: TabId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    pub duration_ms: u64,
}

struct PageState {
    url: String,
    nodes: Vec<DomNode>,
    player_text: String,
    media: Option<MediaState>,
    notification: Option<Notification>,
    reload_count: u32,
}

struct Scripting {
    events: Option<mpsc::Sender<PageEvent>>,
    requests: Option<mpsc::Sender<Envelope>>,
    document_token: CancellationToken,
}

/// One simulated tab. Cloning hands out another handle to the same tab.
#[derive(Clone)]
pub struct Tab {
    id: TabId,
    page: Arc<RwLock<PageState>>,
    scripting: Arc<RwLock<Scripting>>,
    session: SessionStore,
    nav_tx: mpsc::Sender<NavigationEvent>,
}

impl Tab {
    pub(super) fn new(url: &str, nav_tx: mpsc::Sender<NavigationEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            page: Arc::new(RwLock::new(PageState {
                url: url.to_string(),
                nodes: Vec::new(),
                player_text: String::new(),
                media: None,
                notification: None,
                reload_count: 0,
            })),
            scripting: Arc::new(RwLock::new(Scripting {
                events: None,
                requests: None,
                document_token: CancellationToken::new(),
            })),
            session: SessionStore::new(),
            nav_tx,
        }
    }

    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn url(&self) -> String {
        self.page.read().unwrap().url.clone()
    }

    pub fn session(&self) -> SessionStore {
        self.session.clone()
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let page = self.page.read().unwrap();
        PageSnapshot {
            url: page.url.clone(),
            nodes: page.nodes.clone(),
            player_text: page.player_text.clone(),
            media: page.media.clone(),
        }
    }

    /// Attaches a content script: its mutation observer and its request
    /// endpoint. Replaces whatever was attached to the previous document.
    pub fn attach_content(
        &self,
        events: mpsc::Sender<PageEvent>,
        requests: mpsc::Sender<Envelope>,
    ) {
        let mut scripting = self.scripting.write().unwrap();
        scripting.events = Some(events);
        scripting.requests = Some(requests);
    }

    pub fn content_sender(&self) -> Option<mpsc::Sender<Envelope>> {
        self.scripting.read().unwrap().requests.clone()
    }

    /// Token cancelled when the current document unloads.
    pub fn document_token(&self) -> CancellationToken {
        self.scripting.read().unwrap().document_token.clone()
    }

    pub fn insert_node(&self, node: DomNode) {
        let classes = node.classes.clone();
        self.page.write().unwrap().nodes.push(node);
        self.emit(PageEvent::NodeAdded { classes });
    }

    pub fn set_player_text(&self, text: &str) {
        self.page.write().unwrap().player_text = text.to_string();
    }

    pub fn set_media(&self, media: MediaState) {
        self.page.write().unwrap().media = Some(media);
    }

    pub fn seek(&self, seconds: f64) {
        if let Some(media) = self.page.write().unwrap().media.as_mut() {
            media.current_time = seconds;
        }
    }

    pub fn current_time(&self) -> Option<f64> {
        self.page
            .read()
            .unwrap()
            .media
            .as_ref()
            .map(|media| media.current_time)
    }

    /// Replaces any notification already on screen.
    pub fn notify(&self, notification: Notification) {
        self.page.write().unwrap().notification = Some(notification);
    }

    pub fn last_notification(&self) -> Option<Notification> {
        self.page.read().unwrap().notification.clone()
    }

    pub fn reload_count(&self) -> u32 {
        self.page.read().unwrap().reload_count
    }

    /// In-page (single-page-app) navigation: the document survives, only the
    /// URL changes and the observer is told.
    pub fn navigate(&self, url: &str) {
        self.page.write().unwrap().url = url.to_string();
        self.emit(PageEvent::UrlChanged {
            url: url.to_string(),
        });
    }

    /// Full reload: the document and everything attached to it is torn down,
    /// then a completed navigation to the same URL is announced. Session
    /// storage survives.
    pub async fn reload(&self) {
        let url = {
            let mut page = self.page.write().unwrap();
            page.nodes.clear();
            page.player_text.clear();
            page.media = None;
            page.notification = None;
            page.reload_count += 1;
            page.url.clone()
        };

        let old_token = {
            let mut scripting = self.scripting.write().unwrap();
            scripting.events = None;
            scripting.requests = None;
            std::mem::replace(&mut scripting.document_token, CancellationToken::new())
        };
        old_token.cancel();

        let _ = self
            .nav_tx
            .send(NavigationEvent {
                tab_id: self.id,
                url,
            })
            .await;
    }

    fn emit(&self, event: PageEvent) {
        if let Some(events) = self.scripting.read().unwrap().events.clone() {
            let _ = events.try_send(event);
        }
    }
}
