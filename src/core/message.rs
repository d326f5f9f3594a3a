//! Message payload and the queue envelope wrapped around it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::client::Connection;
use crate::core::decision::Decision;

/// An application message as handed to the queue by a producer.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message id, if the producer assigned one.
    pub id: Option<String>,
    /// Raw payload bytes.
    pub payload: Bytes,
    /// Whether the message goes into the priority list.
    pub high_priority: bool,
    /// Producer name carried on the wire, cleared when client names are hidden.
    pub source_name: Option<String>,
}

impl Message {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            id: None,
            payload: payload.into(),
            high_priority: false,
            source_name: None,
        }
    }

    pub fn priority(payload: impl Into<Bytes>) -> Self {
        Self {
            high_priority: true,
            ..Self::new(payload)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_name = Some(source.into());
        self
    }
}

/// Generates a unique message id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// One message inside a queue, together with its delivery bookkeeping.
///
/// The envelope is shared between the queue store, in-flight deliveries and
/// the time keeper, so every mutable field is an atomic or sits behind a
/// short-lived lock. A message is in at most one of the two queue lists at a
/// time and `is_in_queue` mirrors that membership; the flag is only flipped
/// while the owning list's lock is held.
pub struct QueueMessage {
    payload: Bytes,
    id: Mutex<Option<String>>,
    source_name: Mutex<Option<String>>,
    source: Mutex<Option<Weak<dyn Connection>>>,
    high_priority: AtomicBool,
    first_acquirer: AtomicBool,
    pending_acknowledge: AtomicBool,
    is_saved: AtomicBool,
    is_sent: AtomicBool,
    is_in_queue: AtomicBool,
    deadline: Mutex<Option<Instant>>,
    decision: Mutex<Decision>,
}

impl QueueMessage {
    pub fn new(message: Message, source: Option<&Arc<dyn Connection>>) -> Self {
        Self {
            payload: message.payload,
            id: Mutex::new(message.id),
            source_name: Mutex::new(message.source_name),
            source: Mutex::new(source.map(Arc::downgrade)),
            high_priority: AtomicBool::new(message.high_priority),
            first_acquirer: AtomicBool::new(false),
            pending_acknowledge: AtomicBool::new(false),
            is_saved: AtomicBool::new(false),
            is_sent: AtomicBool::new(false),
            is_in_queue: AtomicBool::new(false),
            deadline: Mutex::new(None),
            decision: Mutex::new(Decision::just_allow()),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn id(&self) -> Option<String> {
        self.id.lock().clone()
    }

    pub(crate) fn set_id(&self, id: String) {
        *self.id.lock() = Some(id);
    }

    pub fn source_name(&self) -> Option<String> {
        self.source_name.lock().clone()
    }

    pub(crate) fn clear_source_name(&self) {
        *self.source_name.lock() = None;
    }

    /// Upgrades the weak producer reference, if the connection still exists.
    pub fn source(&self) -> Option<Arc<dyn Connection>> {
        self.source.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_priority(&self) -> bool {
        self.high_priority.load(Ordering::Acquire)
    }

    pub(crate) fn set_priority(&self, high: bool) {
        self.high_priority.store(high, Ordering::Release);
    }

    pub fn is_first_acquirer(&self) -> bool {
        self.first_acquirer.load(Ordering::Acquire)
    }

    pub(crate) fn set_first_acquirer(&self, first: bool) {
        self.first_acquirer.store(first, Ordering::Release);
    }

    pub fn is_pending_acknowledge(&self) -> bool {
        self.pending_acknowledge.load(Ordering::Acquire)
    }

    pub(crate) fn set_pending_acknowledge(&self, pending: bool) {
        self.pending_acknowledge.store(pending, Ordering::Release);
    }

    pub fn is_saved(&self) -> bool {
        self.is_saved.load(Ordering::Acquire)
    }

    pub(crate) fn set_saved(&self, saved: bool) {
        self.is_saved.store(saved, Ordering::Release);
    }

    pub fn is_sent(&self) -> bool {
        self.is_sent.load(Ordering::Acquire)
    }

    pub(crate) fn mark_sent(&self) {
        self.is_sent.store(true, Ordering::Release);
    }

    pub fn is_in_queue(&self) -> bool {
        self.is_in_queue.load(Ordering::Acquire)
    }

    pub(crate) fn set_in_queue(&self, in_queue: bool) {
        self.is_in_queue.store(in_queue, Ordering::Release);
    }

    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock()
    }

    pub(crate) fn set_deadline(&self, deadline: Instant) {
        *self.deadline.lock() = Some(deadline);
    }

    /// Last decision computed for this message.
    pub fn decision(&self) -> Decision {
        *self.decision.lock()
    }

    pub(crate) fn set_decision(&self, decision: Decision) {
        *self.decision.lock() = decision;
    }
}

impl fmt::Debug for QueueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueMessage")
            .field("id", &self.id.lock())
            .field("len", &self.payload.len())
            .field("priority", &self.is_priority())
            .field("in_queue", &self.is_in_queue())
            .field("sent", &self.is_sent())
            .field("saved", &self.is_saved())
            .finish()
    }
}
