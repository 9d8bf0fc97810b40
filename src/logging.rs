//! Diagnostic tracing
//!
//! Output goes to stderr so it never mixes with REPL output on stdout.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn`, or `browsebridge=debug` when `debug`
/// is set. Safe to call more than once; later calls are ignored.
///
/// # Example
/// ```bash
/// RUST_LOG=browsebridge=trace browsebridge --prompt "open example.com"
/// ```
pub fn init(debug: bool) {
    let fallback = if debug { "warn,browsebridge=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
