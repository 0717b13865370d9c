//! HTTP surface of the credo authority.

pub mod error;
pub mod extract;
pub mod metrics;
pub mod middleware;
pub mod resolver;
pub mod routes;
pub mod service;
pub mod settings;
pub mod state;

pub use routes::build_router;
pub use settings::Settings;
pub use state::AppState;
