pub mod config;
pub mod error;
pub mod file_logging;
pub mod middleware;
pub mod routes;
mod state;

pub use state::AppState;
