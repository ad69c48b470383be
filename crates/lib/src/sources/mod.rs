//! Source download ahead of the build.
//!
//! Remote `SourceN`/`PatchN` entries of the resolved spec are fetched into
//! the source directory, where they stay cached for later builds.

pub mod fetch;
pub mod spec;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

pub use fetch::{fetch_into, url_and_filename};
pub use spec::{SourceEntry, source_entries};

#[derive(Debug, Error)]
pub enum DownloadError {
  #[error("failed to read spec {}: {source}", path.display())]
  ReadSpec {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("undefined macro '{name}' in '{entry}'")]
  UnresolvedMacro { name: String, entry: String },

  #[error("unclosed macro in '{entry}'")]
  UnclosedMacro { entry: String },

  #[error("macro expansion deeper than {limit} levels in '{entry}'")]
  MacroRecursion { entry: String, limit: usize },

  #[error("unsupported URL scheme: {url}")]
  UnsupportedScheme { url: String },

  #[error("cannot derive a file name from {url}")]
  InvalidFilename { url: String },

  #[error("download failed for {url}: {message}")]
  Http { url: String, message: String },

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Populates a source directory before the build.
#[allow(async_fn_in_trait)]
pub trait SourceDownloader {
  async fn download_sources(&self, source_dir: &Path, spec: &Path) -> Result<(), DownloadError>;
}

/// Downloads remote spec sources over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
  client: reqwest::Client,
}

impl HttpDownloader {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SourceDownloader for HttpDownloader {
  async fn download_sources(&self, source_dir: &Path, spec: &Path) -> Result<(), DownloadError> {
    let content = tokio::fs::read_to_string(spec)
      .await
      .map_err(|source| DownloadError::ReadSpec {
        path: spec.to_path_buf(),
        source,
      })?;

    let entries = source_entries(&content)?;
    let mut fetched = 0usize;

    for entry in &entries {
      if !entry.is_remote() {
        debug!(tag = %entry.tag, value = %entry.value, "local source, skipping");
        continue;
      }
      fetch_into(&self.client, &entry.value, source_dir).await?;
      fetched += 1;
    }

    info!(spec = %spec.display(), remote = fetched, total = entries.len(), "sources ready");
    Ok(())
  }
}
