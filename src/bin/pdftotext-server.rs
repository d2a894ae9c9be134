//! CLI binary for pdftotext-server.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServerConfig`, sets up logging, and runs the server.

use anyhow::{Context, Result};
use clap::Parser;
use pdftotext_server::{serve, ServerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_EXTRACTOR};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Listen on 0.0.0.0:8080 using pdftotext from PATH
  pdftotext-server

  # Custom port, keep the page layout
  pdftotext-server --port 9000 --extractor-arg=-layout

  # Bound uploads to 50 MB and conversions to 2 minutes
  pdftotext-server --max-upload-bytes 52428800 --timeout 120

  # Convert a document
  curl -F pdf=@statement.pdf http://localhost:8080/

  # Liveness probe
  curl http://localhost:8080/healthcheck

RESPONSES:
  200  text/plain        extracted text, streamed
  400  Multipart request required.
  400  No pdf provided.
  413  Upload too large.              (only with --max-upload-bytes)
  500  Conversion failed. <stderr of the extractor>

ENVIRONMENT VARIABLES:
  HOST, PORT                 Listen address
  PDFTOTEXT_EXTRACTOR        Extraction executable
  PDFTOTEXT_EXTRACTOR_ARGS   Leading extractor arguments, comma separated
  PDFTOTEXT_WORKSPACE_DIR    Parent directory for per-request workspaces
  PDFTOTEXT_CHUNK_SIZE       Upload/response chunk size in bytes
  PDFTOTEXT_MAX_UPLOAD_BYTES Request body limit
  PDFTOTEXT_TIMEOUT          Extractor timeout in seconds
  RUST_LOG                   Log filter, overrides --verbose/--quiet
"#;

/// Serve PDF-to-text conversion over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdftotext-server",
    version,
    about = "Serve PDF-to-text conversion over HTTP",
    long_about = "Accepts multipart/form-data uploads with a part named `pdf` on POST /, \
runs an external extractor (pdftotext by default) on the file, and streams the extracted text \
back as text/plain. GET /healthcheck answers 200 OK.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Extraction executable, invoked as `<extractor> [args…] <input> <output>`.
    #[arg(long, env = "PDFTOTEXT_EXTRACTOR", default_value = DEFAULT_EXTRACTOR)]
    extractor: PathBuf,

    /// Argument passed to the extractor before the file paths (repeatable).
    #[arg(
        long = "extractor-arg",
        env = "PDFTOTEXT_EXTRACTOR_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    extractor_args: Vec<String>,

    /// Parent directory for per-request workspaces (default: system temp dir).
    #[arg(long, env = "PDFTOTEXT_WORKSPACE_DIR")]
    workspace_dir: Option<PathBuf>,

    /// Chunk size in bytes for writing uploads and streaming responses.
    #[arg(long, env = "PDFTOTEXT_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Reject request bodies larger than this many bytes (default: unbounded).
    #[arg(long, env = "PDFTOTEXT_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Kill the extractor after this many seconds (default: unbounded).
    #[arg(long, env = "PDFTOTEXT_TIMEOUT")]
    timeout: Option<u64>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTOTEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "PDFTOTEXT_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;

    if cli.print_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("Failed to serialise config")?
        );
        return Ok(());
    }

    // ── Run server ───────────────────────────────────────────────────────
    serve(config).await.context("Server failed")?;

    Ok(())
}

/// Map CLI args to `ServerConfig`.
fn build_config(cli: &Cli) -> Result<ServerConfig> {
    let mut builder = ServerConfig::builder()
        .bind(SocketAddr::new(cli.host, cli.port))
        .extractor(&cli.extractor)
        .extractor_args(cli.extractor_args.iter().filter(|a| !a.is_empty()))
        .chunk_size(cli.chunk_size);

    if let Some(ref dir) = cli.workspace_dir {
        builder = builder.workspace_root(dir);
    }
    if let Some(bytes) = cli.max_upload_bytes {
        builder = builder.max_upload_bytes(bytes);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.conversion_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}
