//! Per-queue behavior knobs.

use std::time::Duration;

use crate::core::queue::QueueStatus;

/// Options bound to one queue at construction time.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Status the queue starts in.
    pub initial_status: QueueStatus,
    /// Maximum queued messages across both lists. Zero is unlimited.
    pub message_limit: usize,
    /// Maximum payload size in bytes. Zero is unlimited.
    pub message_size_limit: usize,
    /// How long a message may stay queued before it times out. `None` never.
    pub message_timeout: Option<Duration>,
    /// How long a delivery may stay unacknowledged.
    pub acknowledge_timeout: Duration,
    /// Whether consumers are expected to acknowledge deliveries.
    pub request_acknowledge: bool,
    /// Whether the next delivery waits for the previous acknowledgment.
    pub wait_for_acknowledge: bool,
    /// Stop a broadcast after the first successful first-acquirer send.
    pub send_only_first_acquirer: bool,
    /// Strip producer names from outgoing frames.
    pub hide_client_names: bool,
    /// Stamp messages without an id with a generated one.
    pub use_message_id: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            initial_status: QueueStatus::Broadcast,
            message_limit: 0,
            message_size_limit: 0,
            message_timeout: None,
            acknowledge_timeout: Duration::from_secs(15),
            request_acknowledge: false,
            wait_for_acknowledge: false,
            send_only_first_acquirer: false,
            hide_client_names: false,
            use_message_id: true,
        }
    }
}
