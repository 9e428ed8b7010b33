//! API Routes
//!
//! - `/api/upload` - Submit a document for extraction
//! - `/api/health` - Health checks

pub mod health;
pub mod upload;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let origins = state.config.server.cors_allowed_origins.clone();
    let api_router = Router::new()
        .merge(upload::router(state.clone()))
        .merge(health::router(state));

    apply_cors(api_router, &origins).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extraction::{ExtractionPipeline, ProcessWorker};
    use crate::storage::TransientStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransientStore::open(dir.path()).await.unwrap();
        let worker = ProcessWorker::new("true", Vec::new(), Duration::from_secs(1));
        let pipeline = ExtractionPipeline::new(store.clone(), Arc::new(worker));
        let app = create_router(AppState::new(Config::default(), store, pipeline));

        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["max_upload_bytes"], 5 * 1024 * 1024);
    }
}
