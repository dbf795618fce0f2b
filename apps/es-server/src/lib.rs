//! HTTP control surface for batch runs.
//!
//! - routes: axum router and handlers over a shared `RunManager`
//! - registry: optional self-registration heartbeat with a model registry

pub mod registry;
pub mod routes;

pub use registry::{RegistryClient, RegistryError, RegistrySettings, public_base_url};
pub use routes::{AppState, LEGACY_ENDPOINTS, router};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    App(#[from] es_app::AppError),

    #[error("Invalid bind address {addr}")]
    Bind { addr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
