//! Core engine: message envelope, queue store, delivery states, policy hooks.

pub mod client;
pub mod decision;
pub mod delivery;
pub mod handler;
pub mod handlers;
pub mod message;
pub mod queue;
pub mod redelivery;
pub mod stats;
