//! Extraction pipeline
//!
//! ```text
//! validator ──▶ store.write ──▶ worker ──▶ sanitizer ──▶ reconciler ──▶ store.remove
//! ```
//!
//! [`ExtractionPipeline::process`] owns an artifact from the moment it is
//! stored until its result is decided, and always deletes it afterwards.
//! Removal failures are logged only; the result is already fixed by then.

pub mod reconciler;
pub mod sanitizer;
pub mod validator;
pub mod worker;

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::storage::{StorageError, TransientStore, UploadArtifact};

pub use reconciler::{reconcile, ExtractionResult};
pub use sanitizer::sanitize;
pub use validator::{IncomingFile, UploadValidator};
pub use worker::{ExtractionWorker, ProcessWorker, WorkerOutput};

#[derive(Clone)]
pub struct ExtractionPipeline {
    store: TransientStore,
    worker: Arc<dyn ExtractionWorker>,
}

impl ExtractionPipeline {
    pub fn new(store: TransientStore, worker: Arc<dyn ExtractionWorker>) -> Self {
        Self { store, worker }
    }

    /// Run the worker on `artifact`, reconcile its output, then remove the
    /// artifact. Exactly one result is returned per call.
    pub async fn process(&self, artifact: UploadArtifact) -> ExtractionResult {
        let guard = ArtifactGuard::new(self.store.clone(), artifact.id.clone());

        let output = self.worker.run(&artifact.path).await;
        let result = reconcile(output);

        info!(
            artifact = %artifact.id,
            size = artifact.size,
            outcome = result.kind(),
            "Extraction finished"
        );

        guard.release().await;
        result
    }
}

/// Removes an artifact when the request is done with it.
///
/// The normal path calls [`ArtifactGuard::release`]. If the owning future is
/// dropped first (client disconnect), `Drop` schedules the removal on the
/// runtime instead.
struct ArtifactGuard {
    store: TransientStore,
    id: Option<String>,
}

impl ArtifactGuard {
    fn new(store: TransientStore, id: String) -> Self {
        Self { store, id: Some(id) }
    }

    async fn release(mut self) {
        if let Some(id) = self.id.take() {
            remove_logged(&self.store, &id).await;
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                handle.spawn(async move {
                    remove_logged(&store, &id).await;
                });
            }
            Err(_) => warn!(artifact = %id, "No runtime to remove abandoned artifact; leaving it to the reaper"),
        }
    }
}

async fn remove_logged(store: &TransientStore, id: &str) {
    match store.remove(id).await {
        Ok(()) => {}
        Err(StorageError::NotFound(_)) => warn!(artifact = %id, "Artifact already removed"),
        Err(e) => error!(artifact = %id, "Error deleting artifact: {}", e),
    }
}
