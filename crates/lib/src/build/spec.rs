//! Resolution of the one spec file that drives a build.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::build::types::{BuildError, ConfigurationError};
use crate::consts::{SPEC_SUFFIX, TEMPLATE_SUFFIX};
use crate::template::{self, Variables};

/// Spec and template files found in a source directory, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecLayout {
  pub templates: Vec<PathBuf>,
  pub specs: Vec<PathBuf>,
}

/// The file a build will be driven by, before any generation happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
  Static(PathBuf),
  Template(PathBuf),
}

impl SpecLayout {
  /// List `*.spec` and `*.spectemplate` files (hidden files excluded).
  pub fn scan(dir: &Path) -> Result<Self, BuildError> {
    let mut layout = SpecLayout::default();

    for entry in fs::read_dir(dir).map_err(BuildError::io(dir))? {
      let path = entry.map_err(BuildError::io(dir))?.path();

      let hidden = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
      if hidden || !path.is_file() {
        continue;
      }

      match path.extension().and_then(|ext| ext.to_str()) {
        Some(SPEC_SUFFIX) => layout.specs.push(path),
        Some(TEMPLATE_SUFFIX) => layout.templates.push(path),
        _ => {}
      }
    }

    layout.specs.sort();
    layout.templates.sort();
    debug!(dir = %dir.display(), specs = layout.specs.len(), templates = layout.templates.len(), "scanned source directory");

    Ok(layout)
  }

  /// Pick the single spec source, or explain why there is none.
  pub fn select(self, dir: &Path) -> Result<SpecSource, ConfigurationError> {
    let SpecLayout { mut templates, mut specs } = self;

    if templates.len() > 1 {
      return Err(ConfigurationError::AmbiguousTemplate {
        dir: dir.to_path_buf(),
        found: templates,
      });
    }

    if let Some(template) = templates.pop() {
      if !specs.is_empty() {
        return Err(ConfigurationError::ConflictingSpec { dir: dir.to_path_buf() });
      }
      return Ok(SpecSource::Template(template));
    }

    match specs.len() {
      0 => Err(ConfigurationError::NoSpec { dir: dir.to_path_buf() }),
      1 => Ok(SpecSource::Static(specs.remove(0))),
      _ => Err(ConfigurationError::AmbiguousSpec {
        dir: dir.to_path_buf(),
        found: specs,
      }),
    }
  }
}

/// A spec written from a template, deleted once the build is over.
///
/// Call [`GeneratedSpec::release`] to delete it and observe the result;
/// dropping it unreleased deletes it as well.
#[derive(Debug)]
pub struct GeneratedSpec {
  path: PathBuf,
  released: bool,
}

impl GeneratedSpec {
  /// Expand `template` with `vars` into a sibling `.spec` file.
  pub fn generate(template: &Path, vars: &impl Variables) -> Result<Self, BuildError> {
    let text = fs::read_to_string(template).map_err(BuildError::io(template))?;
    let expanded = template::expand(&text, vars).map_err(|source| BuildError::Template {
      path: template.to_path_buf(),
      source,
    })?;

    let path = template.with_extension(SPEC_SUFFIX);
    let mut file = OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&path)
      .map_err(|e| match e.kind() {
        // another build wrote it after the scan
        ErrorKind::AlreadyExists => BuildError::Configuration(ConfigurationError::ConflictingSpec {
          dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        }),
        _ => BuildError::Io {
          path: path.clone(),
          source: e,
        },
      })?;

    // own it before writing so a failed write is still cleaned up
    let generated = GeneratedSpec { path, released: false };
    file
      .write_all(expanded.as_bytes())
      .and_then(|_| file.flush())
      .map_err(BuildError::io(&generated.path))?;

    info!(template = %template.display(), spec = %generated.path.display(), "generated spec from template");
    Ok(generated)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Delete the generated file.
  pub fn release(mut self) -> std::io::Result<()> {
    self.released = true;
    debug!(spec = %self.path.display(), "removing generated spec");
    fs::remove_file(&self.path)
  }
}

impl Drop for GeneratedSpec {
  fn drop(&mut self) {
    if self.released {
      return;
    }
    if let Err(e) = fs::remove_file(&self.path) {
      warn!(spec = %self.path.display(), error = %e, "failed to remove generated spec");
    }
  }
}

/// The spec in use for the current build.
#[derive(Debug)]
pub enum SpecFile {
  Static(PathBuf),
  Generated(GeneratedSpec),
}

impl SpecFile {
  pub fn path(&self) -> &Path {
    match self {
      SpecFile::Static(path) => path,
      SpecFile::Generated(generated) => generated.path(),
    }
  }

  pub fn is_generated(&self) -> bool {
    matches!(self, SpecFile::Generated(_))
  }

  /// Remove the spec if it was generated. Failures are logged, not returned.
  pub fn cleanup(self) {
    if let SpecFile::Generated(generated) = self {
      let path = generated.path().to_path_buf();
      if let Err(e) = generated.release() {
        warn!(spec = %path.display(), error = %e, "failed to remove generated spec");
      }
    }
  }
}
