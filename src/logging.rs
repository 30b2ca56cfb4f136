use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global `fmt` subscriber. `RUST_LOG` wins over `default`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(default: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
