//! Policy outcome for one message lifecycle event.
//!
//! Every [`DeliveryHandler`](crate::core::handler::DeliveryHandler) hook
//! returns a `Decision`; the queue executes it through
//! `ChannelQueue::apply_decision`. When one message is offered to several
//! receivers (broadcast), the per-receiver decisions are joined with
//! [`Decision::merged_with`] before the final application.

/// Re-enqueue position applied after a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutBack {
    /// Leave the message out of the queue.
    No,
    /// Put the message back at the head of its list.
    Start,
    /// Put the message back at the tail of its list.
    End,
}

/// Whether and how an acknowledgment is sent to the producer.
///
/// Variant order is the escalation ladder used by [`Decision::merged_with`]:
/// `None < IfSaved < Negative < Always`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AckDecision {
    /// No acknowledgment.
    None,
    /// Acknowledge only if the message was saved.
    IfSaved,
    /// Send a negative acknowledgment.
    Negative,
    /// Always acknowledge.
    Always,
}

/// Outcome of a single policy hook.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    /// Whether the operation is permitted to continue.
    pub allow: bool,
    /// Whether the message should be persisted.
    pub save_message: bool,
    /// Re-enqueue instruction.
    pub put_back: PutBack,
    /// Producer acknowledgment instruction.
    pub acknowledge: AckDecision,
}

impl Decision {
    /// Decision with explicit allow/save and no put-back or acknowledgment.
    pub const fn new(allow: bool, save_message: bool) -> Self {
        Self {
            allow,
            save_message,
            put_back: PutBack::No,
            acknowledge: AckDecision::None,
        }
    }

    /// Fully specified decision.
    pub const fn full(
        allow: bool,
        save_message: bool,
        put_back: PutBack,
        acknowledge: AckDecision,
    ) -> Self {
        Self {
            allow,
            save_message,
            put_back,
            acknowledge,
        }
    }

    /// Permits the operation without side effects.
    pub const fn just_allow() -> Self {
        Self::new(true, false)
    }

    /// Denies the operation without side effects.
    pub const fn deny() -> Self {
        Self::new(false, false)
    }

    /// Joins this decision with a later one.
    ///
    /// `allow` and `save_message` are OR'd, `put_back` takes the most recent
    /// non-`No` value, and `acknowledge` escalates along the
    /// `None < IfSaved < Negative < Always` ladder.
    pub fn merged_with(self, other: Decision) -> Decision {
        Decision {
            allow: self.allow || other.allow,
            save_message: self.save_message || other.save_message,
            put_back: if other.put_back != PutBack::No {
                other.put_back
            } else {
                self.put_back
            },
            acknowledge: self.acknowledge.max(other.acknowledge),
        }
    }
}

impl Default for Decision {
    fn default() -> Self {
        Self::just_allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_ors_allow_and_save() {
        let a = Decision::new(false, true);
        let b = Decision::new(true, false);
        let merged = a.merged_with(b);
        assert!(merged.allow);
        assert!(merged.save_message);
    }

    #[test]
    fn merge_keeps_most_recent_put_back() {
        let a = Decision::full(true, false, PutBack::Start, AckDecision::None);
        let b = Decision::new(true, false);
        assert_eq!(a.merged_with(b).put_back, PutBack::Start);

        let c = Decision::full(true, false, PutBack::End, AckDecision::None);
        assert_eq!(a.merged_with(c).put_back, PutBack::End);
    }

    #[test]
    fn merge_escalates_acknowledge() {
        let none = Decision::just_allow();
        let if_saved = Decision::full(true, false, PutBack::No, AckDecision::IfSaved);
        let always = Decision::full(true, false, PutBack::No, AckDecision::Always);

        assert_eq!(none.merged_with(if_saved).acknowledge, AckDecision::IfSaved);
        assert_eq!(if_saved.merged_with(none).acknowledge, AckDecision::IfSaved);
        assert_eq!(if_saved.merged_with(always).acknowledge, AckDecision::Always);
        assert_eq!(always.merged_with(if_saved).acknowledge, AckDecision::Always);
    }
}
