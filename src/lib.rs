pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use error::AppError;
pub use services::gateway::{HttpGateway, ResourceGateway};
pub use services::session::PickerSession;

use tracing::info;

/// Wires a session against the remote API from the environment: tracing,
/// the navigation database and the HTTP gateway. Must be called inside a
/// tokio runtime.
pub fn start_from_env() -> Result<PickerSession<HttpGateway>, AppError> {
    let config = AppConfig::from_env()?;
    logging::init_tracing(&config.log_filter)?;
    start(&config)
}

pub fn start(config: &AppConfig) -> Result<PickerSession<HttpGateway>, AppError> {
    let db = data::open_database(&config.db_path)?;
    let gateway = HttpGateway::new(config)?;
    info!(api_url = %config.api_url, db_path = %config.db_path.display(), "starting picker session");
    Ok(PickerSession::start(gateway, db, config))
}
