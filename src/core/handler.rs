//! The pluggable delivery policy.
//!
//! A `DeliveryHandler` decides, at every lifecycle hook, whether delivery may
//! proceed, whether the message is persisted, whether it is put back, and how
//! the producer is acknowledged. The queue is the mechanism; the handler is
//! the policy. Hooks may perform I/O and must be safe to call concurrently
//! for different messages of the same queue.
//!
//! A hook returning `Err` is a policy fault. The queue catches it at the
//! push/drain boundary, asks [`DeliveryHandler::error_raised`] for a recovery
//! decision and applies that; a fault inside recovery itself is swallowed so
//! a buggy policy can never wedge the drain loop.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::client::Connection;
use crate::core::decision::Decision;
use crate::core::delivery::MessageDelivery;
use crate::core::message::QueueMessage;
use crate::core::queue::ChannelQueue;

/// Lifecycle hooks for queue delivery policy.
///
/// Default implementations allow everything and persist nothing, so a policy
/// only overrides the hooks it cares about.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// A producer pushed a message into the queue.
    async fn received_from_producer(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
        _sender: Option<&Arc<dyn Connection>>,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// A send operation for the message is about to start.
    async fn begin_send(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// Asked once per candidate receiver, immediately before sending.
    async fn can_consumer_receive(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
        _receiver: &Arc<dyn Connection>,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// The transport accepted the frame for this receiver.
    async fn consumer_received(
        &self,
        _queue: &ChannelQueue,
        _delivery: &Arc<MessageDelivery>,
        _receiver: &Arc<dyn Connection>,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// The transport refused the frame for this receiver.
    async fn consumer_receive_failed(
        &self,
        _queue: &ChannelQueue,
        _delivery: &Arc<MessageDelivery>,
        _receiver: &Arc<dyn Connection>,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// The send operation for the message completed.
    async fn end_send(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// A consumer acknowledgment arrived. `delivery` is `None` when no
    /// matching delivery record could be found after the bounded retry.
    async fn acknowledge_received(
        &self,
        _queue: &ChannelQueue,
        _message_id: &str,
        _delivery: Option<&Arc<MessageDelivery>>,
        _success: bool,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// A queued message passed its deadline without being dispatched.
    async fn message_timed_out(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// A delivery passed its acknowledgment deadline.
    async fn acknowledge_timed_out(
        &self,
        _queue: &ChannelQueue,
        _delivery: &Arc<MessageDelivery>,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// Informational: a message left the queue store for processing.
    async fn message_dequeued(&self, _queue: &ChannelQueue, _message: &Arc<QueueMessage>) {}

    /// Informational: a message is gone for good.
    async fn message_removed(&self, _queue: &ChannelQueue, _message: &Arc<QueueMessage>) {}

    /// A policy hook failed; return the recovery decision.
    async fn error_raised(
        &self,
        _queue: &ChannelQueue,
        _message: Option<&Arc<QueueMessage>>,
        _error: &anyhow::Error,
    ) -> Result<Decision> {
        Ok(Decision::just_allow())
    }

    /// Persist the message. Returns whether it was actually saved.
    async fn save_message(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
    ) -> Result<bool> {
        Ok(false)
    }
}
