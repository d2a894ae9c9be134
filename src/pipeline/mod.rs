//! Pipeline stages for one conversion request.
//!
//! Each submodule implements exactly one step and can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! workspace ──▶ ingest ──▶ extract ──▶ (crate::stream)
//!  (tempdir)   (multipart)  (child)      (chunked body)
//! ```
//!
//! 1. [`workspace`] — acquire a private temporary directory; removed on
//!    release or drop
//! 2. [`ingest`]    — stream the `pdf` multipart part into the workspace
//! 3. [`extract`]   — run the external extractor as an async child process
//!
//! The response side lives in [`crate::stream`], which takes ownership of the
//! workspace so teardown follows the last chunk.

pub mod extract;
pub mod ingest;
pub mod workspace;
