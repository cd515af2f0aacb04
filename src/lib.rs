pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod slug;
pub mod state;
pub mod store;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
