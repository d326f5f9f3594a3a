//! Receiver/producer connection seam.
//!
//! The queue never owns a connection's lifetime; it holds a reference for the
//! duration of one delivery attempt and checks `is_connected` immediately
//! before sending. Frames are modeled at the message level — wire framing is
//! the transport layer's business.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::core::message::QueueMessage;

/// A frame leaving the queue toward a connected client.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A queue message delivered to a consumer.
    Message {
        id: Option<String>,
        payload: Bytes,
        source: Option<String>,
        first_acquirer: bool,
        /// Pull responses echo the request id for correlation.
        in_reply_to: Option<String>,
    },
    /// Producer acknowledgment for a previously pushed message.
    Acknowledge {
        message_id: Option<String>,
        negative: bool,
    },
    /// Pull response when the queue has nothing to serve.
    Empty { request_id: Option<String> },
}

impl Outbound {
    /// Builds a delivery frame from the message's current state.
    pub(crate) fn for_message(message: &QueueMessage, in_reply_to: Option<String>) -> Self {
        Outbound::Message {
            id: message.id(),
            payload: message.payload().clone(),
            source: message.source_name(),
            first_acquirer: message.is_first_acquirer(),
            in_reply_to,
        }
    }
}

/// One side of a transport connection, as seen by the queue.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stable identifier, used to correlate acknowledgments with deliveries.
    fn id(&self) -> &str;

    /// Whether the peer is still reachable.
    fn is_connected(&self) -> bool;

    /// Sends one frame. Returns false on transport failure; the queue treats
    /// that as a normal negative outcome, never as an error.
    async fn send(&self, frame: Outbound) -> bool;
}

/// In-process connection backed by a tokio channel.
///
/// Embedders and tests receive frames from the returned receiver; dropping it
/// makes subsequent sends fail like a closed socket would.
pub struct LocalConnection {
    id: String,
    connected: AtomicBool,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl LocalConnection {
    pub fn new(id: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            id: id.into(),
            connected: AtomicBool::new(true),
            tx,
        });
        (connection, rx)
    }

    /// Marks the connection as gone; the queue will skip it from now on.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    async fn send(&self, frame: Outbound) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.tx.send(frame).is_ok()
    }
}
