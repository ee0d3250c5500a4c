//! Tracing setup for embedders that don't bring their own subscriber.

use tracing_subscriber::prelude::*;

/// Install a global fmt subscriber.
///
/// The filter comes from `RELAY_LOG` when set, falling back to the given
/// default (e.g. `"relay=info"`). Safe to call once; later calls are no-ops
/// because a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) {
    let filter = std::env::var("RELAY_LOG").unwrap_or_else(|_| default_filter.to_string());

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .try_init();
}
