//! Container runtime access.
//!
//! Wraps the runtime executable (`docker`, `podman`, ...) and the handful of
//! invocations a build needs: asking an image where `rpmbuild` keeps its
//! directories, refreshing an image, and running the build itself.

pub mod command;
pub mod process;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use command::{Mount, RunCommand, pull_args};
pub use process::{Invoker, ProcessError, ProcessExit, SystemInvoker};

/// RPM macro naming the binary package output directory.
pub const RPMDIR_MACRO: &str = "%{_rpmdir}";

/// RPM macro naming the sources directory.
pub const SOURCEDIR_MACRO: &str = "%{_sourcedir}";

#[derive(Debug, Error)]
#[error("container runtime '{name}' not found: {source}")]
pub struct RuntimeNotFoundError {
  pub name: String,
  #[source]
  pub source: which::Error,
}

#[derive(Debug, Error)]
pub enum ImageQueryError {
  #[error("failed to evaluate {macro_name} in image {image}: {source}")]
  Process {
    image: String,
    macro_name: String,
    #[source]
    source: ProcessError,
  },

  #[error("image {image} reported {value:?} for {macro_name}, expected an absolute path")]
  InvalidPath {
    image: String,
    macro_name: String,
    value: String,
  },
}

/// Directories configured for `rpmbuild` inside an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDirs {
  pub rpm_dir: String,
  pub source_dir: String,
}

/// Result of the build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutput {
  /// Batch mode: the build's stdout.
  Captured(String),
  /// Interactive mode: output went to the terminal.
  Attached,
}

/// A located container runtime executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRuntime {
  program: PathBuf,
}

impl ContainerRuntime {
  /// Resolve `name` against `PATH` (or check it directly if it is a path).
  pub fn locate(name: &str) -> Result<Self, RuntimeNotFoundError> {
    let program = which::which(name).map_err(|source| RuntimeNotFoundError {
      name: name.to_string(),
      source,
    })?;
    debug!(runtime = %program.display(), "located container runtime");
    Ok(Self { program })
  }

  pub fn program(&self) -> &Path {
    &self.program
  }

  /// Evaluate an RPM macro with the image's own `rpm`.
  pub async fn eval_rpm_macro(
    &self,
    invoker: &impl Invoker,
    image: &str,
    macro_name: &str,
  ) -> Result<String, ImageQueryError> {
    let args = RunCommand::new(image).command(["rpm", "--eval", macro_name]).to_args();

    let stdout = invoker
      .capture(&self.program, &args)
      .await
      .map_err(|source| ImageQueryError::Process {
        image: image.to_string(),
        macro_name: macro_name.to_string(),
        source,
      })?;

    let value = stdout.trim();
    if !value.starts_with('/') {
      return Err(ImageQueryError::InvalidPath {
        image: image.to_string(),
        macro_name: macro_name.to_string(),
        value: value.to_string(),
      });
    }

    Ok(value.to_string())
  }

  /// Ask the image for its RPM output and sources directories.
  pub async fn image_dirs(&self, invoker: &impl Invoker, image: &str) -> Result<ImageDirs, ImageQueryError> {
    let rpm_dir = self.eval_rpm_macro(invoker, image, RPMDIR_MACRO).await?;
    let source_dir = self.eval_rpm_macro(invoker, image, SOURCEDIR_MACRO).await?;
    debug!(image = %image, rpm_dir = %rpm_dir, source_dir = %source_dir, "resolved image directories");
    Ok(ImageDirs { rpm_dir, source_dir })
  }

  /// Refresh the image from its registry.
  pub async fn pull(&self, invoker: &impl Invoker, image: &str) -> Result<(), ProcessError> {
    info!(image = %image, "pulling image");
    invoker.capture(&self.program, &pull_args(image)).await.map(|_| ())
  }

  /// Run the build; the mode follows [`RunCommand::interactive`].
  ///
  /// A non-zero exit in either mode is a [`ProcessError::Failed`].
  pub async fn run(&self, invoker: &impl Invoker, cmd: &RunCommand) -> Result<RunOutput, ProcessError> {
    let args = cmd.to_args();

    if !cmd.interactive {
      return invoker.capture(&self.program, &args).await.map(RunOutput::Captured);
    }

    let exit = invoker.interactive(&self.program, &args).await?;
    if !exit.success() {
      return Err(ProcessError::Failed {
        program: self.program.display().to_string(),
        code: exit.code,
        stderr: String::new(),
      });
    }
    Ok(RunOutput::Attached)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{FakeInvoker, Reply};

  fn runtime() -> ContainerRuntime {
    ContainerRuntime {
      program: PathBuf::from("/usr/bin/docker"),
    }
  }

  #[test]
  fn locate_missing_runtime() {
    let err = ContainerRuntime::locate("drb-no-such-runtime-binary").unwrap_err();
    assert_eq!(err.name, "drb-no-such-runtime-binary");
  }

  #[test]
  #[cfg(unix)]
  fn locate_absolute_path() {
    let runtime = ContainerRuntime::locate("/bin/sh").unwrap();
    assert!(runtime.program().ends_with("sh"));
  }

  #[tokio::test]
  async fn image_dirs_are_trimmed() {
    let invoker = FakeInvoker::new()
      .reply(Reply::stdout("/root/rpmbuild/RPMS\n"))
      .reply(Reply::stdout("  /root/rpmbuild/SOURCES \n"));

    let dirs = runtime().image_dirs(&invoker, "fedora:40").await.unwrap();

    assert_eq!(
      dirs,
      ImageDirs {
        rpm_dir: "/root/rpmbuild/RPMS".to_string(),
        source_dir: "/root/rpmbuild/SOURCES".to_string(),
      }
    );

    let calls = invoker.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].args, vec!["run", "--rm", "fedora:40", "rpm", "--eval", "%{_rpmdir}"]);
    assert_eq!(calls[1].args, vec!["run", "--rm", "fedora:40", "rpm", "--eval", "%{_sourcedir}"]);
  }

  #[tokio::test]
  async fn unexpanded_macro_is_rejected() {
    let invoker = FakeInvoker::new().reply(Reply::stdout("%{_rpmdir}\n"));

    let err = runtime().image_dirs(&invoker, "busybox").await.unwrap_err();

    assert!(matches!(err, ImageQueryError::InvalidPath { ref value, .. } if value == "%{_rpmdir}"));
  }

  #[tokio::test]
  async fn query_failure_is_reported() {
    let invoker = FakeInvoker::new().reply(Reply::fail(127, "rpm: not found"));

    let err = runtime().image_dirs(&invoker, "alpine").await.unwrap_err();

    assert!(matches!(err, ImageQueryError::Process { ref macro_name, .. } if macro_name == RPMDIR_MACRO));
  }

  #[tokio::test]
  async fn interactive_failure_becomes_process_error() {
    let invoker = FakeInvoker::new().reply(Reply::exit(2));
    let cmd = RunCommand::new("img").interactive(true);

    let err = runtime().run(&invoker, &cmd).await.unwrap_err();

    assert_eq!(err.code(), Some(2));
    assert!(invoker.calls()[0].interactive);
  }

  #[tokio::test]
  async fn batch_run_captures_output() {
    let invoker = FakeInvoker::new().reply(Reply::stdout("Wrote: foo.rpm\n"));
    let cmd = RunCommand::new("img");

    let output = runtime().run(&invoker, &cmd).await.unwrap();

    assert_eq!(output, RunOutput::Captured("Wrote: foo.rpm\n".to_string()));
    assert!(!invoker.calls()[0].interactive);
  }
}
