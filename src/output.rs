//! Values passed between pipeline stages for a single request.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// The `pdf` part of a request, materialised inside the request's workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Absolute path of the file inside the workspace.
    pub path: PathBuf,
    /// Sanitised base name the file was stored under.
    pub file_name: String,
    /// Number of bytes written.
    pub size_bytes: u64,
}

impl UploadedFile {
    /// Path of the converted text file: the upload's base name plus `.txt`,
    /// in the same directory.
    pub fn converted_path(&self) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        dir.join(format!("{}.txt", self.file_name))
    }
}

/// Outcome of one extractor run. Consumed once by the responder.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Exit status of the child process.
    pub status: ExitStatus,
    /// Everything the child wrote to stderr, lossily decoded as UTF-8.
    pub diagnostic: String,
    /// Wall-clock time of the run in milliseconds.
    pub duration_ms: u64,
}

impl ConversionResult {
    /// Exit code 0. A child killed by a signal is never a success.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}
