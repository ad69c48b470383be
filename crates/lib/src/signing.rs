//! Signing key material for the in-container build.
//!
//! The key file is read once and carried inside the build parameters as
//! standard base64. It must be an ASCII-armored, passphrase-free GPG private
//! key; that is the caller's responsibility and is not checked here.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::debug;

use crate::params::ParamValue;

#[derive(Debug, Error)]
#[error("failed to read signing key {}: {source}", path.display())]
pub struct KeyReadError {
  pub path: PathBuf,
  #[source]
  pub source: std::io::Error,
}

/// Signing key ready for transport, or the marker for an unsigned build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedSigningKey {
  None,
  Encoded(String),
}

impl EncodedSigningKey {
  /// Read and encode the key at `path`, if any.
  pub fn provide(path: Option<&Path>) -> Result<Self, KeyReadError> {
    let Some(path) = path else {
      return Ok(EncodedSigningKey::None);
    };

    let bytes = std::fs::read(path).map_err(|source| KeyReadError {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), size = bytes.len(), "loaded signing key");

    Ok(EncodedSigningKey::Encoded(STANDARD.encode(bytes)))
  }

  pub fn is_signing(&self) -> bool {
    matches!(self, EncodedSigningKey::Encoded(_))
  }

  /// Recover the original key bytes.
  pub fn decode(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
    match self {
      EncodedSigningKey::None => Ok(None),
      EncodedSigningKey::Encoded(encoded) => STANDARD.decode(encoded).map(Some),
    }
  }
}

impl From<EncodedSigningKey> for ParamValue {
  fn from(key: EncodedSigningKey) -> Self {
    match key {
      EncodedSigningKey::None => ParamValue::Empty,
      EncodedSigningKey::Encoded(encoded) => ParamValue::Str(encoded),
    }
  }
}
