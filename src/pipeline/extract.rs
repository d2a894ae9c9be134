//! Conversion invoker: run the external extractor on an uploaded file.
//!
//! The extractor runs as a child process awaited through `tokio::process`, so
//! the runtime keeps serving other requests while it works. Its working
//! directory and `TMPDIR` point at the request workspace, stdin is closed, and
//! both output streams are captured. The child is spawned with
//! `kill_on_drop(true)`: if the request future is dropped (client went away,
//! timeout elapsed) the process is killed before the workspace is removed.

use crate::config::ServerConfig;
use crate::error::RequestError;
use crate::output::ConversionResult;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run `extractor [args…] <input> <output>` inside `workspace_dir`.
///
/// Returns the exit status and captured stderr whatever the exit code;
/// deciding what a non-zero exit means is left to the caller.
///
/// # Errors
/// - [`RequestError::ExtractorSpawn`] if the executable cannot be started
/// - [`RequestError::ConversionTimedOut`] if a configured timeout elapses
pub async fn run_extractor(
    config: &ServerConfig,
    workspace_dir: &Path,
    input: &Path,
    output: &Path,
) -> Result<ConversionResult, RequestError> {
    let mut command = Command::new(&config.extractor);
    command
        .args(&config.extractor_args)
        .arg(input)
        .arg(output)
        .current_dir(workspace_dir)
        .env("TMPDIR", workspace_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(
        "Running {} {:?} {} {}",
        config.extractor.display(),
        config.extractor_args,
        input.display(),
        output.display()
    );

    let start = Instant::now();
    let run = command.output();
    let result = match config.conversion_timeout() {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Extractor exceeded {}s on {}; killed",
                    limit.as_secs(),
                    input.display()
                );
                return Err(RequestError::ConversionTimedOut {
                    secs: limit.as_secs(),
                });
            }
        },
        None => run.await,
    };

    let out = result.map_err(|source| RequestError::ExtractorSpawn {
        program: config.extractor.clone(),
        source,
    })?;

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!("Extractor exited with {} after {}ms", out.status, duration_ms);

    Ok(ConversionResult {
        status: out.status,
        diagnostic: String::from_utf8_lossy(&out.stderr).into_owned(),
        duration_ms,
    })
}
