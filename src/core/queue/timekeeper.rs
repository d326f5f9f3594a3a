//! Background deadline enforcement for one queue.
//!
//! The time keeper owns the registry of in-flight deliveries awaiting
//! acknowledgment and runs a periodic scan over two independent deadline
//! classes: messages that sat queued past their deadline, and deliveries
//! whose acknowledgment never arrived. The scan task is bound to the queue's
//! lifetime; it holds only a weak reference and exits when the queue is gone.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::core::delivery::{AckStatus, MessageDelivery};
use crate::core::queue::ChannelQueue;

/// Period of the deadline scan.
const SCAN_INTERVAL: Duration = Duration::from_millis(1000);

pub(crate) struct TimeKeeper {
    deliveries: Mutex<Vec<Arc<MessageDelivery>>>,
}

impl TimeKeeper {
    pub(crate) fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
        }
    }

    /// Registers a delivery whose acknowledgment deadline must be watched.
    pub(crate) fn add_acknowledge_check(&self, delivery: Arc<MessageDelivery>) {
        self.deliveries.lock().push(delivery);
    }

    /// Finds and removes the pending delivery for a (receiver, message id)
    /// pair. Callers retry briefly when this returns `None`, because an
    /// acknowledgment can arrive before the delivery finished registering.
    pub(crate) fn find_and_remove_delivery(
        &self,
        receiver_id: &str,
        message_id: &str,
    ) -> Option<Arc<MessageDelivery>> {
        let mut deliveries = self.deliveries.lock();
        let position = deliveries.iter().position(|d| {
            d.receiver_id() == receiver_id && d.message().id().as_deref() == Some(message_id)
        })?;
        Some(deliveries.remove(position))
    }

    /// Drops every registered delivery.
    pub(crate) fn reset(&self) {
        self.deliveries.lock().clear();
    }

    /// Spawns the periodic scan for a queue.
    pub(crate) fn run(queue: &Arc<ChannelQueue>) -> JoinHandle<()> {
        let queue: Weak<ChannelQueue> = Arc::downgrade(queue);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SCAN_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(queue) = queue.upgrade() else {
                    break;
                };
                if queue.is_destroyed() {
                    break;
                }
                process_message_deadlines(&queue).await;
                process_delivery_deadlines(&queue).await;
            }
        })
    }
}

/// Removes queued messages that passed their deadline and runs the
/// `message_timed_out` pipeline for each.
async fn process_message_deadlines(queue: &Arc<ChannelQueue>) {
    let now = Instant::now();
    let mut expired = queue.take_expired_messages(true, now);
    expired.extend(queue.take_expired_messages(false, now));

    for message in expired {
        queue.stats().add_timed_out();
        match queue.handler().message_timed_out(queue, &message).await {
            Ok(decision) => {
                message.set_decision(decision);
                if let Err(error) = queue.apply_decision(decision, &message, None).await {
                    warn!(
                        target: "relaymq::timekeeper",
                        queue = queue.name(),
                        %error,
                        "applying message timeout decision failed"
                    );
                    continue;
                }
                if !message.is_in_queue() {
                    queue.stats().add_removed();
                    queue.handler().message_removed(queue, &message).await;
                }
            }
            Err(error) => {
                queue.stats().add_error();
                warn!(
                    target: "relaymq::timekeeper",
                    queue = queue.name(),
                    %error,
                    "message timeout hook failed"
                );
            }
        }
    }
}

/// Expires deliveries whose acknowledgment deadline passed and drops
/// completed ones from the registry.
async fn process_delivery_deadlines(queue: &Arc<ChannelQueue>) {
    let now = Instant::now();
    let expired: Vec<Arc<MessageDelivery>> = {
        let mut deliveries = queue.time_keeper().deliveries.lock();
        let mut timed_out = Vec::new();
        deliveries.retain(|delivery| {
            if delivery.status() != AckStatus::Pending {
                return false;
            }
            match delivery.ack_deadline() {
                Some(deadline) if deadline <= now => {
                    timed_out.push(delivery.clone());
                    false
                }
                _ => true,
            }
        });
        timed_out
    };

    for delivery in expired {
        if !delivery.mark_timed_out() {
            continue;
        }
        queue.stats().add_acknowledge_timed_out();
        // The blocked producer-side waiter must not outlive the deadline.
        queue.release_acknowledge_gate(false);

        match queue.handler().acknowledge_timed_out(queue, &delivery).await {
            Ok(decision) => {
                delivery.message().set_decision(decision);
                if let Err(error) = queue.apply_decision(decision, delivery.message(), None).await
                {
                    warn!(
                        target: "relaymq::timekeeper",
                        queue = queue.name(),
                        %error,
                        "applying acknowledge timeout decision failed"
                    );
                }
            }
            Err(error) => {
                queue.stats().add_error();
                warn!(
                    target: "relaymq::timekeeper",
                    queue = queue.name(),
                    %error,
                    "acknowledge timeout hook failed"
                );
            }
        }
    }
}
