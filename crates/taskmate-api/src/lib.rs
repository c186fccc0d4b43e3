pub mod auth;
pub mod export;
pub mod middleware;
pub mod routes;
pub mod tasks;

pub use auth::{AppState, AppStateInner};
pub use routes::build_router;
