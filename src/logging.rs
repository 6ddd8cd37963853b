use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::AppError;

/// Installs the global subscriber. `RUST_LOG` wins over `default_filter`.
/// Calling it again after a subscriber is set is a no-op.
pub fn init_tracing(default_filter: &str) -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|err| AppError::Config(format!("invalid log filter: {err}")))?;

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .try_init();
    Ok(())
}
