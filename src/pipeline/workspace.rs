//! Scoped workspace: one private temporary directory per request.
//!
//! A [`Workspace`] wraps a [`tempfile::TempDir`], so the directory and every
//! file in it are removed when the value is dropped. That covers early
//! returns, `?` propagation, panics, and a dropped handler future after a
//! client disconnect. Completed requests and rejections call
//! [`Workspace::release_async`] instead, so removal runs on the blocking pool
//! and a cleanup failure is logged rather than swallowed by `Drop`.

use crate::error::RequestError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const DIR_PREFIX: &str = "pdftotext-";

/// Request-owned temporary directory, deleted on release or drop.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `root`, or under the system temporary
    /// directory when `root` is `None`.
    ///
    /// The name carries a random suffix and is created with `O_EXCL`
    /// semantics, so two calls never return the same directory.
    pub fn acquire(root: Option<&Path>) -> Result<Self, RequestError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(DIR_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(RequestError::Workspace)?;

        debug!("Acquired workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Path of the workspace directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `file_name` inside the workspace.
    pub fn join(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }

    /// Recursively delete the workspace now, logging any failure.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Released workspace {}", path.display()),
            Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
        }
    }

    /// [`release`](Self::release) on the blocking pool, resolving once the
    /// directory is gone.
    ///
    /// If the blocking task is cancelled the closure is dropped, which still
    /// removes the directory through `Drop`.
    pub async fn release_async(self) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.release()).await {
            warn!("Workspace release task failed: {}", e);
        }
    }
}
