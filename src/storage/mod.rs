// Transient upload storage and its background reaper

pub mod reaper;
pub mod transient;

pub use reaper::{Reaper, ReaperHandle, SweepReport};
pub use transient::{StorageError, StoredEntry, TransientStore, UploadArtifact};
