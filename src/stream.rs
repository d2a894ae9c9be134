//! Streaming responder: send the converted file back in fixed-size chunks.
//!
//! The response body is a [`ChunkStream`] that owns both the open output file
//! and the request's [`Workspace`]. The workspace therefore lives exactly as
//! long as the body:
//!
//! * when the last chunk has been read the stream releases the workspace
//!   before reporting end-of-stream;
//! * when the client disconnects, hyper drops the body and the workspace is
//!   removed by `Drop`.
//!
//! Teardown can never run ahead of the read loop, and the whole file is never
//! held in memory.

use crate::error::RequestError;
use crate::pipeline::workspace::Workspace;
use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures::stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// A boxed stream of file chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

struct ReadState {
    file: File,
    path: PathBuf,
    chunk_size: usize,
    sent: u64,
    workspace: Option<Workspace>,
}

/// Open `path` and turn it into a stream of at most `chunk_size`-byte chunks.
///
/// `workspace` is moved into the stream and released after the final read.
pub async fn chunk_stream(
    workspace: Workspace,
    path: &Path,
    chunk_size: usize,
) -> Result<ChunkStream, RequestError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            workspace.release_async().await;
            return Err(RequestError::io(path, e));
        }
    };

    let state = ReadState {
        file,
        path: path.to_path_buf(),
        chunk_size: chunk_size.max(1),
        sent: 0,
        workspace: Some(workspace),
    };

    let s = stream::try_unfold(state, |mut state| async move {
        let mut buf = vec![0u8; state.chunk_size];
        let n = match state.file.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Read failed on {} after {} bytes: {}", state.path.display(), state.sent, e);
                return Err(e);
            }
        };

        if n == 0 {
            debug!("Streamed {} bytes from {}", state.sent, state.path.display());
            if let Some(ws) = state.workspace.take() {
                ws.release_async().await;
            }
            return Ok(None);
        }

        buf.truncate(n);
        state.sent += n as u64;
        Ok(Some((Bytes::from(buf), state)))
    });

    Ok(Box::pin(s))
}

/// Build the `200 OK` `text/plain` response streaming `path`.
pub async fn stream_file(
    workspace: Workspace,
    path: &Path,
    chunk_size: usize,
) -> Result<Response, RequestError> {
    let body = Body::from_stream(chunk_stream(workspace, path, chunk_size).await?);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(body)
        .map_err(|e| RequestError::io(path, io::Error::new(io::ErrorKind::Other, e)))
}
