//! relaymq – a status-driven message queue delivery engine.
//!
//! This crate exports
//!  * `core`    – message envelope, queue store, delivery states and policy hooks
//!  * `config`  – TOML-driven runtime configuration
//!  * `logging` – tracing subscriber setup
//!
//! The engine is transport-agnostic: producers call
//! [`core::queue::ChannelQueue::push`], consumers are plain
//! [`core::client::Connection`] implementations, and persistence and
//! acknowledgment policy live behind a pluggable
//! [`core::handler::DeliveryHandler`].

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod config;
pub mod core;
pub mod logging;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use config::{load_config, Config};
pub use crate::core::decision::{AckDecision, Decision, PutBack};
pub use crate::core::handler::DeliveryHandler;
pub use crate::core::queue::{ChannelQueue, PullResult, PushResult, QueueOptions, QueueStatus};
