use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::tab::TabId;

/// Request sent between script contexts, tagged the way the wire form is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    Ping,
    AdBlocked { count: u64 },
    GetSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Ping {
        success: bool,
        enabled: bool,
        smart: bool,
        status: String,
    },
    AdBlocked {
        success: bool,
        count: u64,
    },
    #[serde(rename_all = "camelCase")]
    Settings {
        enabled: bool,
        smart_detection: bool,
    },
}

/// One in-flight request plus its reply slot.
#[derive(Debug)]
pub struct Envelope {
    pub sender: Option<TabId>,
    pub message: Message,
    pub reply: oneshot::Sender<Reply>,
}

/// Sender half of the channel into the session-wide coordinator.
#[derive(Clone)]
pub struct RuntimeBus {
    tx: mpsc::Sender<Envelope>,
}

impl RuntimeBus {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn request(&self, sender: Option<TabId>, message: Message) -> Result<Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                sender,
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow!("no listener on the runtime channel"))?;
        reply_rx
            .await
            .context("runtime dropped the reply channel")
    }
}
