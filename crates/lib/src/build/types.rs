//! Types for build requests and their outcome.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::params::ParamsError;
use crate::runtime::{ImageDirs, ImageQueryError, ProcessError, RunOutput, RuntimeNotFoundError};
use crate::scripts::ScriptsError;
use crate::signing::KeyReadError;
use crate::sources::DownloadError;
use crate::template::TemplateError;

/// Problems with the request or the source directory layout.
///
/// These are never retried; the user has to fix the inputs.
#[derive(Debug, Error)]
pub enum ConfigurationError {
  #[error("image reference must not be empty")]
  EmptyImage,

  #[error("source directory {} does not exist or is not a directory", path.display())]
  SourceDirectory { path: PathBuf },

  #[error("target directory {} exists and is not a directory", path.display())]
  TargetNotDirectory { path: PathBuf },

  #[error("signing key {} does not exist or is not a regular file", path.display())]
  SigningKey { path: PathBuf },

  #[error("more than one .spectemplate found in {}: {}", dir.display(), file_names(found))]
  AmbiguousTemplate { dir: PathBuf, found: Vec<PathBuf> },

  #[error("found both .spec and .spectemplate in {}", dir.display())]
  ConflictingSpec { dir: PathBuf },

  #[error("no .spec or .spectemplate found in {}", dir.display())]
  NoSpec { dir: PathBuf },

  #[error("more than one .spec found in {}: {}", dir.display(), file_names(found))]
  AmbiguousSpec { dir: PathBuf, found: Vec<PathBuf> },
}

fn file_names(paths: &[PathBuf]) -> String {
  paths
    .iter()
    .map(|p| p.file_name().unwrap_or(p.as_os_str()).to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join(", ")
}

/// Errors that end a build.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Configuration(#[from] ConfigurationError),

  #[error("template {}: {source}", path.display())]
  Template {
    path: PathBuf,
    #[source]
    source: TemplateError,
  },

  #[error(transparent)]
  KeyRead(#[from] KeyReadError),

  #[error(transparent)]
  RuntimeNotFound(#[from] RuntimeNotFoundError),

  #[error(transparent)]
  ImageQuery(#[from] ImageQueryError),

  #[error("build failed: {0}")]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Download(#[from] DownloadError),

  #[error(transparent)]
  Params(#[from] ParamsError),

  #[error(transparent)]
  Scripts(#[from] ScriptsError),

  #[error("io error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl BuildError {
  pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  /// Exit code of the build process, when the build itself failed.
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      BuildError::Process(e) => e.code(),
      _ => None,
    }
  }
}

/// Caller-supplied build settings, before validation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
  pub image: String,
  pub source_dir: PathBuf,
  pub target_dir: PathBuf,
  /// Passed to `<runtime> run` verbatim.
  pub extra_options: Vec<String>,
  pub download_sources: bool,
  pub bash_on_failure: bool,
  pub always_pull: bool,
  pub sign_with: Option<PathBuf>,
  pub uid: u32,
  pub gid: u32,
}

/// A validated, immutable build request.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  options: BuildOptions,
}

impl BuildRequest {
  /// Validate `options` without touching the filesystem beyond metadata reads.
  ///
  /// The source directory is canonicalised; the target directory and signing
  /// key are made absolute.
  pub fn new(mut options: BuildOptions) -> Result<Self, ConfigurationError> {
    if options.image.trim().is_empty() {
      return Err(ConfigurationError::EmptyImage);
    }

    options.source_dir = match dunce::canonicalize(&options.source_dir) {
      Ok(dir) if dir.is_dir() => dir,
      _ => {
        return Err(ConfigurationError::SourceDirectory {
          path: options.source_dir,
        });
      }
    };

    let target = absolute(&options.target_dir);
    if target.exists() && !target.is_dir() {
      return Err(ConfigurationError::TargetNotDirectory { path: target });
    }
    options.target_dir = target;

    if let Some(key) = options.sign_with.take() {
      let key = absolute(&key);
      if !key.is_file() {
        return Err(ConfigurationError::SigningKey { path: key });
      }
      options.sign_with = Some(key);
    }

    Ok(Self { options })
  }

  pub fn image(&self) -> &str {
    &self.options.image
  }

  pub fn source_dir(&self) -> &Path {
    &self.options.source_dir
  }

  pub fn target_dir(&self) -> &Path {
    &self.options.target_dir
  }

  pub fn extra_options(&self) -> &[String] {
    &self.options.extra_options
  }

  pub fn download_sources(&self) -> bool {
    self.options.download_sources
  }

  pub fn bash_on_failure(&self) -> bool {
    self.options.bash_on_failure
  }

  pub fn always_pull(&self) -> bool {
    self.options.always_pull
  }

  pub fn sign_with(&self) -> Option<&Path> {
    self.options.sign_with.as_deref()
  }

  pub fn uid(&self) -> u32 {
    self.options.uid
  }

  pub fn gid(&self) -> u32 {
    self.options.gid
  }
}

fn absolute(path: &Path) -> PathBuf {
  dunce::canonicalize(path)
    .or_else(|_| std::path::absolute(path))
    .unwrap_or_else(|_| path.to_path_buf())
}

/// Result of a completed build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
  /// The spec the build used.
  pub spec: PathBuf,
  /// Whether `spec` was generated from a template (and has been removed).
  pub generated: bool,
  pub image_dirs: ImageDirs,
  pub output: RunOutput,
}
