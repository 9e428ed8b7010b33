use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Router,
};
use bytes::BytesMut;
use tracing::{debug, info};

use crate::extraction::{ExtractionResult, IncomingFile, UploadValidator};
use crate::models::AppState;
use crate::types::{AppError, AppResult};

/// Slack on top of the file size limit for multipart framing and text parts.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.validator.max_bytes().saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/upload", post(upload_document))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// POST /api/upload - validate, store and extract one document
async fn upload_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<ExtractionResult> {
    // Not a multipart request at all: nothing was uploaded
    let Ok(mut multipart) = multipart else {
        return Err(AppError::NoFileProvided);
    };

    let file = read_single_file(&mut multipart, &state.validator).await?;
    let artifact = state.validator.accept(file, &state.store).await?;
    info!(artifact = %artifact.id, size = artifact.size, "Upload accepted");

    Ok(state.pipeline.process(artifact).await)
}

/// Pull the one expected file part out of the form, enforcing type and size
/// while it streams in. Text parts are ignored; any other file part is an
/// error.
async fn read_single_file(
    multipart: &mut Multipart,
    validator: &UploadValidator,
) -> AppResult<Option<IncomingFile>> {
    let to_app_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::SizeExceeded {
                limit: validator.max_bytes(),
            }
        } else {
            AppError::MalformedUpload(e.body_text())
        }
    };

    let mut file: Option<IncomingFile> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(to_app_error)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            debug!(field = ?field.name(), "Skipping non-file form field");
            continue;
        };
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name != validator.field_name() || file.is_some() {
            return Err(AppError::UnexpectedField(field_name));
        }

        let content_type = field.content_type().map(str::to_string);
        validator.check_type(content_type.as_deref())?;

        let mut buf = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(to_app_error)? {
            validator.check_size(buf.len() + chunk.len())?;
            buf.extend_from_slice(&chunk);
        }

        file = Some(IncomingFile {
            field_name,
            file_name: Some(file_name),
            content_type,
            bytes: buf.freeze(),
        });
    }

    Ok(file)
}
