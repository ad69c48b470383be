//! Configuration read from the environment.

use std::path::PathBuf;

use crate::consts::DEFAULT_RUNTIME;

/// Container runtime executable name or path.
pub const RUNTIME_ENV: &str = "DRB_CONTAINER_RUNTIME";

/// Host directory to mount as the helper-script directory.
pub const SCRIPTS_DIR_ENV: &str = "DRB_SCRIPTS_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Runtime to invoke; resolved against `PATH` at build time.
  pub runtime: String,
  /// Overrides the bundled helper scripts when set.
  pub scripts_dir: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      runtime: DEFAULT_RUNTIME.to_string(),
      scripts_dir: None,
    }
  }
}

impl Config {
  pub fn from_env() -> Self {
    let runtime = std::env::var(RUNTIME_ENV)
      .ok()
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
      .unwrap_or_else(|| DEFAULT_RUNTIME.to_string());

    let scripts_dir = std::env::var_os(SCRIPTS_DIR_ENV)
      .filter(|v| !v.is_empty())
      .map(PathBuf::from);

    Self { runtime, scripts_dir }
  }
}

/// Real user id of the calling process.
#[cfg(unix)]
pub fn calling_uid() -> u32 {
  rustix::process::getuid().as_raw()
}

#[cfg(not(unix))]
pub fn calling_uid() -> u32 {
  0
}

/// Real group id of the calling process.
#[cfg(unix)]
pub fn calling_gid() -> u32 {
  rustix::process::getgid().as_raw()
}

#[cfg(not(unix))]
pub fn calling_gid() -> u32 {
  0
}
