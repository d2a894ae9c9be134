//! Error types for the pdftotext-server library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ServerError`] — **Fatal**: the server cannot start or keep running
//!   (invalid configuration, address already in use). Returned from
//!   [`crate::server::serve`] and the configuration builder.
//!
//! * [`RequestError`] — **Per-request**: one conversion failed (wrong content
//!   type, missing part, extractor exited non-zero). It is turned into an HTTP
//!   response by its [`IntoResponse`] impl and never affects other requests.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

/// Body returned for every resource failure. Details go to the log only.
pub const INTERNAL_ERROR_BODY: &str = "Internal server error.";

/// Fatal errors returned while configuring or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop terminated with an I/O error.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Failure of a single conversion request.
///
/// Each variant maps to exactly one status code; see [`RequestError::status`].
#[derive(Debug, Error)]
pub enum RequestError {
    // ── Client protocol errors (400) ──────────────────────────────────────
    /// Content type is not `multipart/form-data`.
    #[error("Multipart request required.")]
    MultipartRequired,

    /// The multipart body was fully consumed without a `pdf` part.
    #[error("No pdf provided.")]
    NoPdfProvided,

    /// The multipart body could not be decoded part-way through.
    #[error("Malformed multipart request.")]
    MalformedMultipart { detail: String },

    /// The body exceeded the configured upload limit.
    #[error("Upload too large.")]
    UploadTooLarge,

    // ── Conversion errors (500, diagnostic surfaced) ──────────────────────
    /// The extractor exited non-zero; `diagnostic` is its stderr verbatim.
    #[error("Conversion failed. {diagnostic}")]
    ConversionFailed { diagnostic: String },

    /// The extractor exceeded the configured timeout and was killed.
    #[error("Conversion failed. Timed out after {secs}s.")]
    ConversionTimedOut { secs: u64 },

    // ── Resource errors (500, generic body) ───────────────────────────────
    /// The per-request workspace could not be created.
    #[error("Failed to create workspace: {0}")]
    Workspace(#[source] std::io::Error),

    /// The extractor executable could not be started.
    #[error("Failed to start extractor '{program}': {source}")]
    ExtractorSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure inside the workspace.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RequestError {
    /// HTTP status code this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::MultipartRequired
            | RequestError::NoPdfProvided
            | RequestError::MalformedMultipart { .. } => StatusCode::BAD_REQUEST,
            RequestError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::ConversionFailed { .. }
            | RequestError::ConversionTimedOut { .. }
            | RequestError::Workspace(_)
            | RequestError::ExtractorSpawn { .. }
            | RequestError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for resource failures whose details must not reach the client.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            RequestError::Workspace(_) | RequestError::ExtractorSpawn { .. } | RequestError::Io { .. }
        )
    }

    /// Text sent as the response body.
    pub fn body_text(&self) -> String {
        if self.is_internal() {
            INTERNAL_ERROR_BODY.to_string()
        } else {
            self.to_string()
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RequestError::Io {
            path: path.into(),
            source,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            error!("Request failed: {}", self);
        }
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body_text(),
        )
            .into_response()
    }
}
