pub use tracing::{debug, error, info, instrument, trace, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
};

/// `RUST_LOG` filtering (default `info`) and uptime-stamped output, with span
/// close events at debug level.
fn subscriber() -> impl tracing::Subscriber + Send + Sync + 'static {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let is_debug = env_filter.to_string().contains("debug")
        || std::env::var("RUST_LOG").unwrap_or_default().contains("debug");

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug { FmtSpan::CLOSE } else { FmtSpan::NONE });

    tracing_subscriber::registry().with(env_filter).with(fmt_layer)
}

/// Installs the global subscriber. Panics if one is already set.
pub fn init() {
    subscriber().init();
}

pub fn try_init() -> Result<(), TryInitError> {
    subscriber().try_init()
}
