use axum::{extract::State, routing::get, Json, Router};
use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        upload_dir: state.store.root().display().to_string(),
        max_upload_bytes: state.validator.max_bytes(),
        accepted_content_type: state.config.upload.accepted_content_type.clone(),
    };

    Json(response)
}
