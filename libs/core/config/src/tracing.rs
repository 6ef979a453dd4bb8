use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset in production.
const PRODUCTION_FILTER: &str = "warn,domain_vector_sets=info";

/// Default filter when `RUST_LOG` is unset in development.
const DEVELOPMENT_FILTER: &str = "info,domain_vector_sets=debug,database=debug";

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in main() before any fallible operations. Safe to call multiple times.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Build the filter used by [`init_tracing`].
///
/// `RUST_LOG` wins when it is set and valid.
pub fn default_filter(environment: &Environment) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if environment.is_production() {
            EnvFilter::new(PRODUCTION_FILTER)
        } else {
            EnvFilter::new(DEVELOPMENT_FILTER)
        }
    })
}

/// Initialize tracing with environment-aware output and error span capture.
///
/// - **Production** (`APP_ENV=production`): flattened JSON events, no targets.
/// - **Development** (default): pretty, human-readable output.
///
/// Both modes include `tracing_error::ErrorLayer` so eyre reports carry span traces.
/// Calling this more than once is harmless; later calls are skipped.
pub fn init_tracing(environment: &Environment) {
    let filter = default_filter(environment);

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(_) => info!(environment = ?environment, "Tracing initialized"),
        Err(_) => debug!("Tracing already initialized, skipping re-initialization"),
    }
}
