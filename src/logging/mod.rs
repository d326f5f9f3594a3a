//! Tracing subscriber setup for embedders and test harnesses.

use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set and falls back to `info`.
/// Queue internals log under the `relaymq::queue` and `relaymq::timekeeper`
/// targets, so `RUST_LOG=relaymq::queue=trace` narrows to one of them.
pub fn init_logging() {
    let filter: EnvFilter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let formatting_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .compact();

    let subscriber = Registry::default().with(filter).with(formatting_layer);

    // The engine is embeddable; the host process may already have installed
    // its own subscriber, in which case this call is a no-op.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
