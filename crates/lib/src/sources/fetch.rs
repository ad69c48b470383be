//! Downloading remote sources into the source directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::DownloadError;

/// Split a source URL into the URL to request and the local file name.
///
/// The file name is the last path segment, or the `#/name` fragment when
/// present (the usual rpm convention for renaming downloads).
pub fn url_and_filename(url: &str) -> Result<(&str, String), DownloadError> {
  let (request, fragment) = match url.split_once('#') {
    Some((request, fragment)) => (request, Some(fragment)),
    None => (url, None),
  };

  let named = match fragment {
    Some(f) if f.starts_with('/') => f,
    _ => request.split('?').next().unwrap_or(request),
  };
  let filename = named.rsplit('/').next().unwrap_or_default();

  if filename.is_empty() || filename == "." || filename == ".." {
    return Err(DownloadError::InvalidFilename { url: url.to_string() });
  }

  Ok((request, filename.to_string()))
}

/// Download `url` into `dir` unless a file of the same name is already there.
///
/// Returns the local path. Files are written to a temporary file in `dir` and
/// renamed into place, so an interrupted download never leaves a partial
/// source behind.
pub async fn fetch_into(client: &reqwest::Client, url: &str, dir: &Path) -> Result<PathBuf, DownloadError> {
  let scheme = url.split_once("://").map(|(s, _)| s.to_ascii_lowercase());
  if !matches!(scheme.as_deref(), Some("http") | Some("https")) {
    return Err(DownloadError::UnsupportedScheme { url: url.to_string() });
  }

  let (request, filename) = url_and_filename(url)?;
  let dest = dir.join(&filename);

  if dest.exists() {
    info!(path = %dest.display(), "using cached source");
    return Ok(dest);
  }

  info!(url = %request, "downloading source");

  let response = client.get(request).send().await.map_err(|e| DownloadError::Http {
    url: request.to_string(),
    message: e.to_string(),
  })?;

  if !response.status().is_success() {
    return Err(DownloadError::Http {
      url: request.to_string(),
      message: format!("HTTP {}", response.status()),
    });
  }

  let bytes = response.bytes().await.map_err(|e| DownloadError::Http {
    url: request.to_string(),
    message: e.to_string(),
  })?;

  let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|source| DownloadError::Write {
    path: dest.clone(),
    source,
  })?;
  file.write_all(&bytes).map_err(|source| DownloadError::Write {
    path: dest.clone(),
    source,
  })?;
  file.persist(&dest).map_err(|e| DownloadError::Write {
    path: dest.clone(),
    source: e.error,
  })?;

  debug!(path = %dest.display(), size = bytes.len(), "download complete");

  Ok(dest)
}
