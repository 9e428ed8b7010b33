//! Upload validation
//!
//! Checks run in the order the client would hit them: a file must be present,
//! its declared MIME type must be the accepted type, and its size must not
//! exceed the limit. Only a payload that passes all three reaches storage, so
//! rejected uploads never create an artifact or spawn a worker.

use bytes::Bytes;

use crate::config::UploadConfig;
use crate::storage::{TransientStore, UploadArtifact};
use crate::types::{AppError, AppResult};

/// A single file part pulled out of the request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct UploadValidator {
    field_name: String,
    accepted_type: String,
    max_bytes: usize,
}

impl UploadValidator {
    pub fn new(
        field_name: impl Into<String>,
        accepted_type: impl Into<String>,
        max_bytes: usize,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            accepted_type: accepted_type.into(),
            max_bytes,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.field_name.clone(),
            config.accepted_content_type.clone(),
            config.max_bytes,
        )
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// The declared type must equal the accepted type exactly.
    pub fn check_type(&self, declared: Option<&str>) -> AppResult<()> {
        let declared = declared.unwrap_or("").trim();
        if declared == self.accepted_type {
            Ok(())
        } else {
            Err(AppError::InvalidType {
                expected: self.accepted_type.clone(),
                got: if declared.is_empty() {
                    "none".to_string()
                } else {
                    declared.to_string()
                },
            })
        }
    }

    pub fn check_size(&self, size: usize) -> AppResult<()> {
        if size > self.max_bytes {
            Err(AppError::SizeExceeded {
                limit: self.max_bytes,
            })
        } else {
            Ok(())
        }
    }

    pub fn validate(&self, file: Option<&IncomingFile>) -> AppResult<()> {
        let file = file.ok_or(AppError::NoFileProvided)?;
        self.check_type(file.content_type.as_deref())?;
        self.check_size(file.bytes.len())
    }

    /// Validate and, on success, commit the payload to the store.
    pub async fn accept(
        &self,
        file: Option<IncomingFile>,
        store: &TransientStore,
    ) -> AppResult<UploadArtifact> {
        self.validate(file.as_ref())?;
        let file = file.ok_or(AppError::NoFileProvided)?;
        let content_type = file
            .content_type
            .as_deref()
            .unwrap_or(&self.accepted_type);

        Ok(store.store(&self.field_name, &file.bytes, content_type).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> UploadValidator {
        UploadValidator::new("pdf", "application/pdf", 16)
    }

    fn file(content_type: Option<&str>, bytes: &'static [u8]) -> IncomingFile {
        IncomingFile {
            field_name: "pdf".to_string(),
            file_name: Some("resume.pdf".to_string()),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(validator().validate(None), Err(AppError::NoFileProvided)));
    }

    #[test]
    fn test_type_must_match_exactly() {
        let v = validator();
        assert!(v.check_type(Some("application/pdf")).is_ok());
        assert!(matches!(v.check_type(Some("application/pdf; name=x")), Err(AppError::InvalidType { .. })));
        assert!(matches!(v.check_type(Some("image/png")), Err(AppError::InvalidType { .. })));
        assert!(matches!(v.check_type(Some("application/pdfx")), Err(AppError::InvalidType { .. })));
        assert!(matches!(v.check_type(None), Err(AppError::InvalidType { .. })));
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let v = validator();
        assert!(v.check_size(16).is_ok());
        assert!(matches!(v.check_size(17), Err(AppError::SizeExceeded { limit: 16 })));
    }

    #[test]
    fn test_type_is_checked_before_size() {
        let big_png = file(Some("image/png"), b"0123456789abcdefXYZ");
        assert!(matches!(
            validator().validate(Some(&big_png)),
            Err(AppError::InvalidType { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_uploads_leave_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransientStore::open(dir.path()).await.unwrap();
        let v = validator();

        let wrong_type = v.accept(Some(file(Some("text/plain"), b"hi")), &store).await;
        assert!(matches!(wrong_type, Err(AppError::InvalidType { .. })));

        let too_big = v
            .accept(Some(file(Some("application/pdf"), b"0123456789abcdefXYZ")), &store)
            .await;
        assert!(matches!(too_big, Err(AppError::SizeExceeded { .. })));

        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accepted_upload_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransientStore::open(dir.path()).await.unwrap();

        let artifact = validator()
            .accept(Some(file(Some("application/pdf"), b"%PDF")), &store)
            .await
            .unwrap();

        assert_eq!(artifact.content_type, "application/pdf");
        assert!(store.contains(&artifact.id).await);
    }
}
