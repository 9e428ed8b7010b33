// Oxidized Extract - document upload and out-of-process extraction relay

pub mod config;
pub mod models;
pub mod types;
pub mod storage;    // Transient upload storage and reaper
pub mod extraction; // Validation, worker adapter, sanitiser, reconciliation
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
