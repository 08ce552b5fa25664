use lendx_sdk::objects::{EventType, WsFrame};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::{Notify, mpsc};
use tracing::warn;
use uuid::Uuid;

pub type ClientId = Uuid;

/// Default outbound queue capacity per connection.
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ClientSendError {
    #[error("connection closed")]
    Closed,

    #[error("outbound queue full, connection kicked")]
    Full,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The sending half of one websocket connection.
///
/// Frames are queued with `try_send` on a bounded queue and never block the
/// caller. A connection whose queue overflows is kicked: the frame is dropped
/// and the socket task is told to close.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    tx: mpsc::Sender<String>,
    kicked: AtomicBool,
    kick_notify: Notify,
}

impl Client {
    /// Create a client and the receiver its socket task drains.
    pub fn new(capacity: usize) -> (Arc<Client>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Client {
            id: Uuid::new_v4(),
            tx,
            kicked: AtomicBool::new(false),
            kick_notify: Notify::new(),
        };
        (Arc::new(client), rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The socket task has gone away or the client was kicked.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.is_kicked()
    }

    pub fn is_kicked(&self) -> bool {
        self.kicked.load(Ordering::Acquire)
    }

    pub fn kick(&self) {
        if !self.kicked.swap(true, Ordering::AcqRel) {
            self.kick_notify.notify_one();
        }
    }

    /// Resolves once the client has been kicked.
    pub async fn kicked(&self) {
        if self.is_kicked() {
            return;
        }
        self.kick_notify.notified().await;
    }

    /// Encode and queue one frame.
    pub fn send_message<P: Serialize + ?Sized>(
        &self,
        channel: &str,
        event_type: impl Into<EventType>,
        payload: &P,
    ) -> Result<(), ClientSendError> {
        let frame = serde_json::to_string(&WsFrame::new(channel, event_type, payload))?;
        self.send_raw(frame)
    }

    /// Queue an already encoded frame.
    pub fn send_raw(&self, frame: String) -> Result<(), ClientSendError> {
        if self.is_kicked() {
            return Err(ClientSendError::Closed);
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(client_id = %self.id, "Client queue full, kicking connection");
                self.kick();
                Err(ClientSendError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ClientSendError::Closed),
        }
    }
}
