//! Response shape for the upload endpoint. Videos themselves are plain files.

use serde::{Deserialize, Serialize};

/// Returned immediately by `POST /upload-video`, before any processing happens.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadResponse {
    /// Sanitized name the upload was stored under.
    pub filename: String,

    /// Public URL where the annotated video will appear once the job finishes.
    pub marked_url: String,

    /// Always `"processing"`.
    pub status: String,
}
