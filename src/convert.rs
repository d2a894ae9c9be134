//! Request pipeline: multipart body in, streamed text response out.
//!
//! One call to [`convert_request`] walks a request through the stages in
//! strict order:
//!
//! ```text
//! RECEIVED ──▶ content-type check ──▶ INGESTING ──▶ CONVERTING ──▶ STREAMING ──▶ DONE
//!                   │                     │              │
//!                   ▼                     ▼              ▼
//!           REJECTED_BAD_TYPE     REJECTED_NO_FILE  FAILED_CONVERSION
//! ```
//!
//! The content-type check happens before a workspace exists. From then on the
//! [`Workspace`] is owned by this function until it is handed to the response
//! body, and every rejection releases it before the error response is built.

use crate::config::ServerConfig;
use crate::error::RequestError;
use crate::pipeline::{extract, ingest, workspace::Workspace};
use crate::stream;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use axum::response::Response;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Run the full conversion pipeline for one `POST /` request.
///
/// # Errors
/// Every failure is a [`RequestError`]; its `IntoResponse` impl produces the
/// matching status code and body.
pub async fn convert_request(
    config: &ServerConfig,
    request: Request,
) -> Result<Response, RequestError> {
    // ── Content-type check ───────────────────────────────────────────────
    if !ingest::is_multipart(request.headers()) {
        info!(
            "Bad request: content type {:?} instead of multipart/form-data",
            request
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>")
        );
        return Err(RequestError::MultipartRequired);
    }

    let multipart = Multipart::from_request(request, &()).await.map_err(|e| {
        info!("Bad request: unusable multipart header: {}", e);
        RequestError::MultipartRequired
    })?;

    // ── Ingest ───────────────────────────────────────────────────────────
    let workspace = Workspace::acquire(config.workspace_root.as_deref())?;

    match ingest_and_convert(config, multipart, &workspace).await {
        // ── Stream ───────────────────────────────────────────────────────
        Ok(output) => {
            debug!("Streaming {}", output.display());
            stream::stream_file(workspace, &output, config.chunk_size).await
        }
        Err(e) => {
            workspace.release_async().await;
            Err(e)
        }
    }
}

/// Store the upload and run the extractor, returning the converted file.
async fn ingest_and_convert(
    config: &ServerConfig,
    multipart: Multipart,
    workspace: &Workspace,
) -> Result<PathBuf, RequestError> {
    let Some(upload) = ingest::save_upload(multipart, workspace, config.chunk_size).await? else {
        info!("Bad request: no {} part provided", ingest::PDF_FIELD);
        return Err(RequestError::NoPdfProvided);
    };

    // ── Convert ──────────────────────────────────────────────────────────
    let output = upload.converted_path();
    let result = extract::run_extractor(config, workspace.path(), &upload.path, &output).await?;

    if !result.success() {
        error!(
            "Conversion of '{}' failed ({}): {}",
            upload.file_name,
            result.status,
            result.diagnostic.trim_end()
        );
        return Err(RequestError::ConversionFailed {
            diagnostic: result.diagnostic,
        });
    }

    info!(
        "Converted '{}' ({} bytes) in {}ms",
        upload.file_name, upload.size_bytes, result.duration_ms
    );
    Ok(output)
}
