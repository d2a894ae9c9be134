//! # pdftotext-server
//!
//! A small HTTP endpoint that converts uploaded PDF documents to plain text
//! with an external extractor (`pdftotext` from poppler by default) and
//! streams the text back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST / (multipart/form-data, part "pdf")
//!  │
//!  ├─ 1. Check     content type must be multipart/form-data      → 400
//!  ├─ 2. Workspace private temp dir for this request
//!  ├─ 3. Ingest    stream the "pdf" part to disk in 64 KiB chunks → 400 if absent
//!  ├─ 4. Extract   pdftotext <input> <input>.txt as a child       → 500 on non-zero exit
//!  ├─ 5. Stream    200 text/plain, 64 KiB chunks
//!  └─ 6. Teardown  workspace removed after the last chunk (or on any error)
//! ```
//!
//! `GET /healthcheck` always answers `200 OK`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdftotext_server::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .bind("127.0.0.1:8080".parse()?)
//!         .extractor_arg("-layout")
//!         .build()?;
//!     serve(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftotext-server` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## Limits
//!
//! Uploads and extractor runs are unbounded unless
//! [`ServerConfig::max_upload_bytes`] or
//! [`ServerConfig::conversion_timeout_secs`] are set.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_CHUNK_SIZE, DEFAULT_EXTRACTOR};
pub use convert::convert_request;
pub use error::{RequestError, ServerError};
pub use output::{ConversionResult, UploadedFile};
pub use server::{router, serve, serve_with_listener, shutdown_signal};
pub use stream::{chunk_stream, stream_file};
