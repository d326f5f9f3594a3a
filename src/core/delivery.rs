//! Tracking of one (message, receiver) delivery attempt.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;

use crate::core::client::Connection;
use crate::core::message::QueueMessage;

/// Acknowledgment state of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// No acknowledgment seen yet.
    Pending,
    /// Consumer acknowledged positively.
    Acknowledged,
    /// Consumer acknowledged negatively.
    NegativeAcknowledged,
    /// The acknowledgment deadline passed first.
    TimedOut,
}

/// One attempt to send a specific message to a specific receiver.
///
/// Created after the policy admits the receiver, registered with the time
/// keeper only when an acknowledgment deadline applies, and dropped when the
/// acknowledgment arrives, times out, or the queue is destroyed.
pub struct MessageDelivery {
    message: Arc<QueueMessage>,
    receiver_id: String,
    receiver: Weak<dyn Connection>,
    first_acquirer: bool,
    ack_deadline: Option<Instant>,
    sent_at: Mutex<Option<Instant>>,
    is_sent: AtomicBool,
    status: Mutex<AckStatus>,
}

impl MessageDelivery {
    pub fn new(
        message: Arc<QueueMessage>,
        receiver: &Arc<dyn Connection>,
        ack_deadline: Option<Instant>,
    ) -> Self {
        let first_acquirer = message.is_first_acquirer();
        Self {
            message,
            receiver_id: receiver.id().to_string(),
            receiver: Arc::downgrade(receiver),
            first_acquirer,
            ack_deadline,
            sent_at: Mutex::new(None),
            is_sent: AtomicBool::new(false),
            status: Mutex::new(AckStatus::Pending),
        }
    }

    pub fn message(&self) -> &Arc<QueueMessage> {
        &self.message
    }

    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    /// Upgrades the receiver reference, if the connection still exists.
    pub fn receiver(&self) -> Option<Arc<dyn Connection>> {
        self.receiver.upgrade()
    }

    /// Whether the message had not been delivered to anyone before this attempt.
    pub fn is_first_acquirer(&self) -> bool {
        self.first_acquirer
    }

    pub fn ack_deadline(&self) -> Option<Instant> {
        self.ack_deadline
    }

    pub fn sent_at(&self) -> Option<Instant> {
        *self.sent_at.lock()
    }

    pub fn is_sent(&self) -> bool {
        self.is_sent.load(Ordering::Acquire)
    }

    pub fn status(&self) -> AckStatus {
        *self.status.lock()
    }

    /// Records the successful send and marks the message as sent.
    pub(crate) fn mark_as_sent(&self) {
        *self.sent_at.lock() = Some(Instant::now());
        self.is_sent.store(true, Ordering::Release);
        self.message.mark_sent();
    }

    pub(crate) fn mark_acknowledged(&self, success: bool) {
        *self.status.lock() = if success {
            AckStatus::Acknowledged
        } else {
            AckStatus::NegativeAcknowledged
        };
    }

    /// Flips a pending delivery to timed out. Returns false when an
    /// acknowledgment won the race.
    pub(crate) fn mark_timed_out(&self) -> bool {
        let mut status = self.status.lock();
        if *status == AckStatus::Pending {
            *status = AckStatus::TimedOut;
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for MessageDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDelivery")
            .field("message", &self.message.id())
            .field("receiver", &self.receiver_id)
            .field("sent", &self.is_sent())
            .field("status", &self.status())
            .finish()
    }
}
