//! Tracing/logging initialization.
//!
//! One entry point sets up `tracing_subscriber` for the gateway binary so
//! output format and filtering stay uniform across operating modes.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter` when set (e.g.
/// `"hypergate_gateway=debug"`); `log_json` switches the human-readable
/// output to structured JSON lines.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
