//! Test utilities for drb-lib.
//!
//! [`FakeInvoker`] stands in for the container runtime: it records every
//! invocation and answers from a queue of canned replies.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::runtime::{Invoker, ProcessError, ProcessExit};

/// Canned response for one invocation.
#[derive(Debug, Clone)]
pub enum Reply {
  Stdout(String),
  Fail { code: i32, stderr: String },
  Exit(i32),
}

impl Reply {
  pub fn stdout(s: &str) -> Self {
    Reply::Stdout(s.to_string())
  }

  pub fn fail(code: i32, stderr: &str) -> Self {
    Reply::Fail {
      code,
      stderr: stderr.to_string(),
    }
  }

  pub fn exit(code: i32) -> Self {
    Reply::Exit(code)
  }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub interactive: bool,
  /// Content of the watched file at the time of the call, if it existed.
  pub watched: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeInvoker {
  replies: Mutex<VecDeque<Reply>>,
  calls: Mutex<Vec<Call>>,
  watch: Option<PathBuf>,
}

impl FakeInvoker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue a reply; once the queue is empty every call succeeds silently.
  pub fn reply(self, reply: Reply) -> Self {
    self.replies.lock().unwrap().push_back(reply);
    self
  }

  /// Snapshot `path` on every call.
  pub fn watch(mut self, path: impl Into<PathBuf>) -> Self {
    self.watch = Some(path.into());
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  fn record(&self, program: &Path, args: &[OsString], interactive: bool) -> Option<Reply> {
    let watched = self
      .watch
      .as_ref()
      .and_then(|path| std::fs::read_to_string(path).ok());

    self.calls.lock().unwrap().push(Call {
      program: program.to_path_buf(),
      args: args.iter().map(|a| a.to_string_lossy().into_owned()).collect(),
      interactive,
      watched,
    });

    self.replies.lock().unwrap().pop_front()
  }
}

impl Invoker for FakeInvoker {
  async fn capture(&self, program: &Path, args: &[OsString]) -> Result<String, ProcessError> {
    match self.record(program, args, false) {
      None => Ok(String::new()),
      Some(Reply::Stdout(s)) => Ok(s),
      Some(Reply::Exit(0)) => Ok(String::new()),
      Some(Reply::Exit(code)) => Err(ProcessError::Failed {
        program: program.display().to_string(),
        code: Some(code),
        stderr: String::new(),
      }),
      Some(Reply::Fail { code, stderr }) => Err(ProcessError::Failed {
        program: program.display().to_string(),
        code: Some(code),
        stderr,
      }),
    }
  }

  async fn interactive(&self, program: &Path, args: &[OsString]) -> Result<ProcessExit, ProcessError> {
    match self.record(program, args, true) {
      None | Some(Reply::Stdout(_)) => Ok(ProcessExit { code: Some(0) }),
      Some(Reply::Exit(code)) | Some(Reply::Fail { code, .. }) => Ok(ProcessExit { code: Some(code) }),
    }
  }
}

/// Write `content` to `dir/name`, returning the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
  let path = dir.join(name);
  std::fs::write(&path, content).unwrap();
  path
}
