//! Structured `run` invocations.
//!
//! Arguments are kept as discrete tokens and handed to the runtime without a
//! shell, so paths and options never need quoting.

use std::ffi::OsString;
use std::path::PathBuf;

/// A host directory mapped into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
  pub host: PathBuf,
  pub container: String,
  pub read_only: bool,
}

impl Mount {
  pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
    Self {
      host: host.into(),
      container: container.into(),
      read_only: false,
    }
  }

  pub fn read_only(mut self) -> Self {
    self.read_only = true;
    self
  }

  /// The `host:container[:ro]` volume spec.
  pub fn to_volume_arg(&self) -> OsString {
    let mut arg = OsString::from(self.host.as_os_str());
    arg.push(":");
    arg.push(&self.container);
    if self.read_only {
      arg.push(":ro");
    }
    arg
  }
}

/// A `<runtime> run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
  pub image: String,
  pub remove: bool,
  pub extra_options: Vec<String>,
  pub mounts: Vec<Mount>,
  pub interactive: bool,
  pub workdir: Option<String>,
  pub command: Vec<String>,
}

impl RunCommand {
  pub fn new(image: impl Into<String>) -> Self {
    Self {
      image: image.into(),
      remove: true,
      extra_options: Vec::new(),
      mounts: Vec::new(),
      interactive: false,
      workdir: None,
      command: Vec::new(),
    }
  }

  /// Options passed through verbatim, ahead of the generated ones.
  pub fn extra_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.extra_options.extend(options.into_iter().map(Into::into));
    self
  }

  pub fn mount(mut self, mount: Mount) -> Self {
    self.mounts.push(mount);
    self
  }

  /// Attach stdin and allocate a TTY.
  pub fn interactive(mut self, interactive: bool) -> Self {
    self.interactive = interactive;
    self
  }

  pub fn workdir(mut self, dir: impl Into<String>) -> Self {
    self.workdir = Some(dir.into());
    self
  }

  pub fn command(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.command.extend(args.into_iter().map(Into::into));
    self
  }

  /// Arguments for the runtime executable, starting with `run`.
  pub fn to_args(&self) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["run".into()];

    if self.remove {
      args.push("--rm".into());
    }
    args.extend(self.extra_options.iter().map(OsString::from));
    for mount in &self.mounts {
      args.push("-v".into());
      args.push(mount.to_volume_arg());
    }
    if self.interactive {
      args.push("-i".into());
      args.push("-t".into());
    }
    if let Some(ref dir) = self.workdir {
      args.push("-w".into());
      args.push(dir.into());
    }
    args.push(self.image.as_str().into());
    args.extend(self.command.iter().map(OsString::from));

    args
  }
}

/// Arguments for `<runtime> pull <image>`.
pub fn pull_args(image: &str) -> Vec<OsString> {
  vec!["pull".into(), image.into()]
}
