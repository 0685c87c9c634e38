use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::host::{LocalStore, RuntimeBus, Tab};

use super::state::DetectionState;
use super::worker::monitor_loop;

const EVENT_CHANNEL_CAPACITY: usize = 32;
const REQUEST_CHANNEL_CAPACITY: usize = 8;

/// Owns one injected monitor: attaches it to the tab's current document and
/// can stop it independently of page lifecycle.
pub struct MonitorController {
    handle: Option<JoinHandle<()>>,
    stop_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new() -> Self {
        Self {
            handle: None,
            stop_token: None,
        }
    }

    pub fn start(&mut self, tab: Tab, storage: LocalStore, bus: RuntimeBus) -> Result<()> {
        if self.handle.is_some() {
            bail!("monitor already attached");
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        tab.attach_content(events_tx, requests_tx);

        let document = tab.document_token();
        let stop_token = CancellationToken::new();
        let state = Arc::new(Mutex::new(DetectionState::new(Instant::now())));

        let handle = tokio::spawn(monitor_loop(
            tab,
            storage,
            bus,
            state,
            events_rx,
            requests_rx,
            document,
            stop_token.clone(),
        ));

        self.handle = Some(handle);
        self.stop_token = Some(stop_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.stop_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("monitor loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for MonitorController {
    fn default() -> Self {
        Self::new()
    }
}
