//! Multipart ingestion: stream the `pdf` part of a request into the workspace.
//!
//! Parts are read incrementally from the request body. Bytes of the `pdf`
//! part go through a [`BufWriter`] sized to the configured chunk size, so at
//! most one chunk of upload data is held in memory at a time. Every other part
//! is skipped without being read.

use crate::error::RequestError;
use crate::output::UploadedFile;
use crate::pipeline::workspace::Workspace;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::{header, HeaderMap, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

/// Form-field name carrying the document.
pub const PDF_FIELD: &str = "pdf";

/// File name used when the client sends none, or one that sanitises to
/// nothing.
pub const FALLBACK_FILE_NAME: &str = "upload.pdf";

/// True when the `Content-Type` header starts with `multipart/form-data`,
/// ignoring ASCII case and leading whitespace.
pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to a safe base name.
///
/// Both `/` and `\` count as separators, so `../../etc/passwd` and
/// `C:\Users\x\a.pdf` become `passwd` and `a.pdf`. Names that reduce to
/// nothing, `.`, `..`, or contain NUL fall back to [`FALLBACK_FILE_NAME`].
pub fn sanitize_file_name(raw: Option<&str>) -> String {
    let base = raw
        .and_then(|name| name.rsplit(|c: char| c == '/' || c == '\\').next())
        .map(str::trim)
        .unwrap_or("");

    match base {
        "" | "." | ".." => FALLBACK_FILE_NAME.to_string(),
        name if name.contains('\0') => FALLBACK_FILE_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Consume the whole multipart body, writing the first `pdf` part into
/// `workspace`.
///
/// Returns `Ok(None)` when the body held no `pdf` part. Later `pdf` parts are
/// skipped so a workspace never holds more than one upload.
pub async fn save_upload(
    mut multipart: Multipart,
    workspace: &Workspace,
    chunk_size: usize,
) -> Result<Option<UploadedFile>, RequestError> {
    let mut upload: Option<UploadedFile> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name != PDF_FIELD {
            debug!("Skipping multipart part '{}'", name);
            continue;
        }
        if upload.is_some() {
            info!("Ignoring additional '{}' part", PDF_FIELD);
            continue;
        }

        let file_name = sanitize_file_name(field.file_name());
        let path = workspace.join(&file_name);
        let file = File::create(&path)
            .await
            .map_err(|e| RequestError::io(&path, e))?;
        let mut writer = BufWriter::with_capacity(chunk_size, file);
        let mut size_bytes = 0u64;

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| RequestError::io(&path, e))?;
            size_bytes += chunk.len() as u64;
        }
        writer
            .shutdown()
            .await
            .map_err(|e| RequestError::io(&path, e))?;

        debug!("Stored upload '{}' ({} bytes)", file_name, size_bytes);
        upload = Some(UploadedFile {
            path,
            file_name,
            size_bytes,
        });
    }

    Ok(upload)
}

/// Map a body-decoding failure onto the request error taxonomy.
fn multipart_error(err: MultipartError) -> RequestError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        info!("Bad request: upload exceeds the configured limit");
        RequestError::UploadTooLarge
    } else {
        let detail = err.body_text();
        info!("Bad request: malformed multipart body: {}", detail);
        RequestError::MalformedMultipart { detail }
    }
}
