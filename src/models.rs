use std::sync::Arc;

use crate::config::Config;
use crate::extraction::{ExtractionPipeline, UploadValidator};
use crate::storage::TransientStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: TransientStore,
    pub validator: UploadValidator,
    pub pipeline: ExtractionPipeline,
}

impl AppState {
    pub fn new(config: Config, store: TransientStore, pipeline: ExtractionPipeline) -> Self {
        Self {
            validator: UploadValidator::from_config(&config.upload),
            config: Arc::new(config),
            store,
            pipeline,
        }
    }
}

/// Body of every non-success response.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Cleaned worker output, present on decode failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
            details: None,
            output: None,
            exit_code: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub accepted_content_type: String,
}
