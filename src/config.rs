//! Configuration types for the conversion server.
//!
//! All server behaviour is controlled through [`ServerConfig`], built via its
//! [`ServerConfigBuilder`]. The config is immutable once the server starts and
//! is the only state shared between concurrent requests.

use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default size of upload write chunks and response read chunks (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default extraction executable, resolved through `PATH`.
pub const DEFAULT_EXTRACTOR: &str = "pdftotext";

/// Configuration for a conversion server.
///
/// Built via [`ServerConfig::builder()`] or using [`ServerConfig::default()`].
///
/// # Example
/// ```rust
/// use pdftotext_server::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .bind("127.0.0.1:9000".parse().unwrap())
///     .extractor_arg("-layout")
///     .conversion_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.extractor_args, vec!["-layout".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to. Default: `0.0.0.0:8080`.
    pub bind: SocketAddr,

    /// Extraction executable. Default: `pdftotext`.
    ///
    /// Invoked as `extractor [extractor_args…] <input> <output>` and expected
    /// to exit 0 on success and write diagnostics to stderr on failure.
    pub extractor: PathBuf,

    /// Arguments inserted before the input and output paths. Default: none.
    pub extractor_args: Vec<String>,

    /// Parent directory for per-request workspaces. Default: the system
    /// temporary directory.
    pub workspace_root: Option<PathBuf>,

    /// Chunk size in bytes for writing uploads and streaming responses.
    /// Default: 65536.
    pub chunk_size: usize,

    /// Maximum accepted request body size in bytes. Default: unbounded.
    ///
    /// Uploads above the limit are rejected with `413 Payload Too Large`.
    pub max_upload_bytes: Option<usize>,

    /// Wall-clock limit for one extractor run, in seconds. Default: unbounded.
    ///
    /// When set, an extractor still running at the deadline is killed and the
    /// request fails with a conversion error.
    pub conversion_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            extractor: PathBuf::from(DEFAULT_EXTRACTOR),
            extractor_args: Vec::new(),
            workspace_root: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_bytes: None,
            conversion_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// The extractor timeout as a [`Duration`], if one is configured.
    pub fn conversion_timeout(&self) -> Option<Duration> {
        self.conversion_timeout_secs.map(Duration::from_secs)
    }

    /// Check the invariants the builder enforces. Useful for configs that
    /// were deserialised rather than built.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.extractor.as_os_str().is_empty() {
            return Err(ServerError::InvalidConfig(
                "Extractor executable must not be empty".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ServerError::InvalidConfig(
                "Chunk size must be ≥ 1".into(),
            ));
        }
        if self.max_upload_bytes == Some(0) {
            return Err(ServerError::InvalidConfig(
                "Upload limit must be ≥ 1 byte when set".into(),
            ));
        }
        if self.conversion_timeout_secs == Some(0) {
            return Err(ServerError::InvalidConfig(
                "Conversion timeout must be ≥ 1s when set".into(),
            ));
        }
        if let Some(ref root) = self.workspace_root {
            if !root.is_dir() {
                return Err(ServerError::InvalidConfig(format!(
                    "Workspace root '{}' is not a directory",
                    root.display()
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind = addr;
        self
    }

    pub fn extractor(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.extractor = program.into();
        self
    }

    /// Append one leading extractor argument.
    pub fn extractor_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extractor_args.push(arg.into());
        self
    }

    /// Replace all leading extractor arguments.
    pub fn extractor_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extractor_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = Some(bytes);
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ServerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
