//! Result reconciliation: worker exit status + output → one terminal result.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{error, warn};

use super::sanitizer::sanitize;
use super::worker::WorkerOutput;
use crate::models::ErrorResponse;

/// Terminal outcome of one extraction request.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    /// Worker exited 0 and its cleaned output decoded. Shape is not checked.
    Success(Value),

    /// Worker exited 0 but the cleaned output is not valid JSON.
    DecodeFailure { cleaned: String, diagnostic: String },

    /// Worker exited non-zero, was killed, or never started.
    ProcessFailure {
        exit_code: Option<i32>,
        diagnostic: String,
    },
}

impl ExtractionResult {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionResult::Success(_) => "Success",
            ExtractionResult::DecodeFailure { .. } => "DecodeFailure",
            ExtractionResult::ProcessFailure { .. } => "ProcessFailure",
        }
    }
}

/// Decide the outcome of a finished worker.
///
/// A non-zero (or missing) exit code wins outright and stdout is never looked
/// at. Otherwise stdout is sanitised and decoded strictly.
pub fn reconcile(output: WorkerOutput) -> ExtractionResult {
    if !output.success() {
        return ExtractionResult::ProcessFailure {
            exit_code: output.exit_code,
            diagnostic: output.stderr,
        };
    }

    let cleaned = sanitize(&output.stdout_lossy());
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => ExtractionResult::Success(value),
        Err(e) => {
            warn!("Worker output did not decode: {}", e);
            ExtractionResult::DecodeFailure {
                cleaned,
                diagnostic: e.to_string(),
            }
        }
    }
}

impl IntoResponse for ExtractionResult {
    fn into_response(self) -> Response {
        match self {
            ExtractionResult::Success(value) => (StatusCode::OK, Json(value)).into_response(),
            ExtractionResult::DecodeFailure { cleaned, diagnostic } => {
                error!("Cleaned worker output: {}", cleaned);
                let body = ErrorResponse::new("Error parsing data from extraction worker", "DecodeFailure")
                    .with_details(diagnostic)
                    .with_output(cleaned);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            ExtractionResult::ProcessFailure {
                exit_code,
                diagnostic,
            } => {
                error!(?exit_code, "Extraction worker failed");
                let mut body =
                    ErrorResponse::new("Processing error", "ProcessFailure").with_details(diagnostic);
                body.exit_code = exit_code;
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exited(code: i32, stdout: &str, stderr: &str) -> WorkerOutput {
        WorkerOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.to_string(),
            exit_code: Some(code),
            timed_out: false,
            duration_ms: 5,
        }
    }

    #[test]
    fn test_clean_json_succeeds() {
        let result = reconcile(exited(0, r#"{"name": "Alice", "skills": ["Go"]}"#, ""));
        assert_eq!(
            result,
            ExtractionResult::Success(json!({"name": "Alice", "skills": ["Go"]}))
        );
    }

    #[test]
    fn test_python_style_output_is_repaired() {
        let result = reconcile(exited(0, "{'score': NaN, 'hired': False}\n", ""));
        assert_eq!(
            result,
            ExtractionResult::Success(json!({"score": null, "hired": false}))
        );
    }

    #[test]
    fn test_garbage_is_a_decode_failure() {
        match reconcile(exited(0, "not valid data at all", "")) {
            ExtractionResult::DecodeFailure { cleaned, diagnostic } => {
                assert_eq!(cleaned, "not valid data at all");
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected DecodeFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_stdout_is_a_decode_failure() {
        let result = reconcile(exited(0, "", ""));
        assert_eq!(result.kind(), "DecodeFailure");
    }

    #[test]
    fn test_nonzero_exit_ignores_stdout() {
        let result = reconcile(exited(1, r#"{"ok": true}"#, "engine crashed"));
        assert_eq!(
            result,
            ExtractionResult::ProcessFailure {
                exit_code: Some(1),
                diagnostic: "engine crashed".to_string(),
            }
        );
    }

    #[test]
    fn test_timeout_is_a_process_failure() {
        let output = WorkerOutput {
            stderr: "extraction worker timed out after 1s".to_string(),
            timed_out: true,
            ..Default::default()
        };
        match reconcile(output) {
            ExtractionResult::ProcessFailure { exit_code, diagnostic } => {
                assert_eq!(exit_code, None);
                assert!(diagnostic.contains("timed out"));
            }
            other => panic!("expected ProcessFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_http_status_mapping() {
        let ok = ExtractionResult::Success(json!({})).into_response();
        assert_eq!(ok.status(), StatusCode::OK);

        let decode = ExtractionResult::DecodeFailure {
            cleaned: "x".to_string(),
            diagnostic: "bad".to_string(),
        }
        .into_response();
        assert_eq!(decode.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
