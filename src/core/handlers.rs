//! Ready-made delivery policies.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::client::Connection;
use crate::core::decision::{AckDecision, Decision, PutBack};
use crate::core::delivery::MessageDelivery;
use crate::core::handler::DeliveryHandler;
use crate::core::message::QueueMessage;
use crate::core::queue::ChannelQueue;
use crate::core::redelivery::RedeliveryService;

/// Allows every operation and keeps nothing.
pub struct JustAllowHandler;

#[async_trait]
impl DeliveryHandler for JustAllowHandler {}

/// When the producer acknowledgment is sent by [`SendAckHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckWhen {
    /// After the producer's push reached the queue.
    AfterReceived,
    /// After the message was sent to consumers.
    AfterSent,
    /// After a consumer acknowledged the message.
    AfterAcknowledge,
}

/// Allows all operations and acknowledges the producer at a configurable
/// point in the message lifecycle.
pub struct SendAckHandler {
    when: AckWhen,
}

impl SendAckHandler {
    pub fn new(when: AckWhen) -> Self {
        Self { when }
    }

    fn ack_decision() -> Decision {
        Decision::full(true, false, PutBack::No, AckDecision::Always)
    }
}

#[async_trait]
impl DeliveryHandler for SendAckHandler {
    async fn received_from_producer(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
        _sender: Option<&Arc<dyn Connection>>,
    ) -> Result<Decision> {
        if self.when == AckWhen::AfterReceived {
            return Ok(Self::ack_decision());
        }
        Ok(Decision::just_allow())
    }

    async fn end_send(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
    ) -> Result<Decision> {
        if self.when == AckWhen::AfterSent {
            return Ok(Self::ack_decision());
        }
        Ok(Decision::just_allow())
    }

    async fn acknowledge_received(
        &self,
        _queue: &ChannelQueue,
        _message_id: &str,
        _delivery: Option<&Arc<MessageDelivery>>,
        _success: bool,
    ) -> Result<Decision> {
        if self.when == AckWhen::AfterAcknowledge {
            return Ok(Self::ack_decision());
        }
        Ok(Decision::just_allow())
    }
}

/// When [`RedeliveryHandler`] drops a message's attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteWhen {
    /// As soon as the message was sent to a consumer.
    AfterSend,
    /// Only once a consumer acknowledged it.
    AfterAcknowledge,
}

/// Counts delivery attempts per message id through a [`RedeliveryService`].
///
/// Every send of an unacknowledged message bumps the persisted counter; a
/// successful acknowledgment (or the configured completion point) removes it,
/// so after a restart the counters name exactly the messages that were in
/// flight.
pub struct RedeliveryHandler {
    service: Arc<RedeliveryService>,
    delete_when: DeleteWhen,
}

impl RedeliveryHandler {
    pub fn new(service: Arc<RedeliveryService>, delete_when: DeleteWhen) -> Self {
        Self {
            service,
            delete_when,
        }
    }

    pub fn service(&self) -> &Arc<RedeliveryService> {
        &self.service
    }
}

#[async_trait]
impl DeliveryHandler for RedeliveryHandler {
    async fn begin_send(
        &self,
        _queue: &ChannelQueue,
        message: &Arc<QueueMessage>,
    ) -> Result<Decision> {
        if let Some(id) = message.id() {
            let attempt = self.service.attempt_count(&id).await + 1;
            self.service.set(&id, attempt).await?;
        }
        Ok(Decision::just_allow())
    }

    async fn end_send(
        &self,
        _queue: &ChannelQueue,
        message: &Arc<QueueMessage>,
    ) -> Result<Decision> {
        if self.delete_when == DeleteWhen::AfterSend && message.is_sent() {
            if let Some(id) = message.id() {
                self.service.remove(&id).await?;
            }
        }
        Ok(Decision::just_allow())
    }

    async fn acknowledge_received(
        &self,
        _queue: &ChannelQueue,
        message_id: &str,
        _delivery: Option<&Arc<MessageDelivery>>,
        success: bool,
    ) -> Result<Decision> {
        if success {
            self.service.remove(message_id).await?;
        }
        Ok(Decision::just_allow())
    }
}
