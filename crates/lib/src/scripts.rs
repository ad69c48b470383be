//! The helper-script directory mounted into the build container.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::consts::{APP_NAME, ENTRYPOINT};

/// The bundled container entry point.
pub const ENTRYPOINT_SCRIPT: &str = include_str!(concat!(
  env!("CARGO_MANIFEST_DIR"),
  "/dockerscripts/rpmbuild-dir-in-docker.sh"
));

#[derive(Debug, Error)]
pub enum ScriptsError {
  #[error("failed to prepare helper scripts in {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("helper-script directory {} has no {entrypoint}", path.display())]
  MissingEntrypoint { path: PathBuf, entrypoint: String },
}

/// Host directory holding the entry point, alive for the duration of a build.
#[derive(Debug)]
pub enum ScriptsDir {
  /// Bundled scripts written to a private temporary directory.
  Bundled(TempDir),
  /// A directory supplied by configuration.
  External(PathBuf),
}

impl ScriptsDir {
  /// Use `external` if given, otherwise materialise the bundled scripts.
  pub fn prepare(external: Option<&Path>) -> Result<Self, ScriptsError> {
    match external {
      Some(dir) => Self::external(dir),
      None => Self::bundled(),
    }
  }

  fn external(dir: &Path) -> Result<Self, ScriptsError> {
    let dir = dunce::canonicalize(dir).map_err(|source| ScriptsError::Write {
      path: dir.to_path_buf(),
      source,
    })?;

    if !dir.join(entrypoint_name()).is_file() {
      return Err(ScriptsError::MissingEntrypoint {
        path: dir,
        entrypoint: entrypoint_name().to_string(),
      });
    }

    Ok(ScriptsDir::External(dir))
  }

  fn bundled() -> Result<Self, ScriptsError> {
    let write_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source: std::io::Error| ScriptsError::Write { path, source }
    };

    let temp = tempfile::Builder::new()
      .prefix(&format!("{APP_NAME}-scripts-"))
      .tempdir()
      .map_err(write_err(&std::env::temp_dir()))?;

    let script = temp.path().join(entrypoint_name());
    fs::write(&script, ENTRYPOINT_SCRIPT).map_err(write_err(&script))?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).map_err(write_err(&script))?;
      fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o755)).map_err(write_err(temp.path()))?;
    }

    debug!(path = %temp.path().display(), "wrote bundled helper scripts");
    Ok(ScriptsDir::Bundled(temp))
  }

  pub fn path(&self) -> &Path {
    match self {
      ScriptsDir::Bundled(temp) => temp.path(),
      ScriptsDir::External(dir) => dir,
    }
  }
}

fn entrypoint_name() -> &'static str {
  ENTRYPOINT.trim_start_matches("./")
}
