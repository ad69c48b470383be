//! Process execution for runtime invocations.
//!
//! Two modes are provided: capture (stdout returned, stderr kept for error
//! reporting) and interactive (the caller's terminal is inherited). Neither
//! retries nor times out; the call blocks until the child exits or the
//! future is dropped, which kills a captured child.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Exit of a process run in interactive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
  /// Exit code, `None` if terminated by a signal.
  pub code: Option<i32>,
}

impl ProcessExit {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{program} {}{}", exit_description(.code), stderr_suffix(.stderr))]
  Failed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },
}

impl ProcessError {
  /// Exit code of the failed process, if it exited normally.
  pub fn code(&self) -> Option<i32> {
    match self {
      ProcessError::Spawn { .. } => None,
      ProcessError::Failed { code, .. } => *code,
    }
  }
}

fn exit_description(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exited with code {}", code),
    None => "was terminated by a signal".to_string(),
  }
}

fn stderr_suffix(stderr: &str) -> String {
  let stderr = stderr.trim();
  if stderr.is_empty() {
    String::new()
  } else {
    format!(": {}", stderr)
  }
}

/// Runs external processes.
#[allow(async_fn_in_trait)]
pub trait Invoker {
  /// Run to completion and return stdout.
  ///
  /// Fails with [`ProcessError::Failed`] on a non-zero exit, carrying the
  /// exit code and captured stderr (stdout if stderr is empty).
  async fn capture(&self, program: &Path, args: &[OsString]) -> Result<String, ProcessError>;

  /// Run with stdin, stdout and stderr inherited and return the exit status.
  async fn interactive(&self, program: &Path, args: &[OsString]) -> Result<ProcessExit, ProcessError>;
}

/// [`Invoker`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInvoker;

impl Invoker for SystemInvoker {
  async fn capture(&self, program: &Path, args: &[OsString]) -> Result<String, ProcessError> {
    debug!(program = %program.display(), args = ?args, "running (capture)");

    // dropping the future on interrupt kills the child
    let output = Command::new(program)
      .args(args)
      .stdin(Stdio::null())
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|source| spawn_error(program, source))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
      // builds log to stdout only; keep that as the diagnostic
      let stderr = if stderr.trim().is_empty() { stdout } else { stderr };
      return Err(ProcessError::Failed {
        program: program.display().to_string(),
        code: output.status.code(),
        stderr,
      });
    }

    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }

    Ok(stdout)
  }

  async fn interactive(&self, program: &Path, args: &[OsString]) -> Result<ProcessExit, ProcessError> {
    debug!(program = %program.display(), args = ?args, "running (interactive)");

    let status = Command::new(program)
      .args(args)
      .stdin(Stdio::inherit())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit())
      .status()
      .await
      .map_err(|source| spawn_error(program, source))?;

    Ok(ProcessExit { code: status.code() })
  }
}

fn spawn_error(program: &Path, source: std::io::Error) -> ProcessError {
  ProcessError::Spawn {
    program: program.display().to_string(),
    source,
  }
}
