//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

pub const RPM_DIR: &str = "/root/rpmbuild/RPMS";
pub const SOURCE_DIR: &str = "/root/rpmbuild/SOURCES";

/// Stands in for `docker`: records every invocation, answers `rpm --eval`
/// queries and pretends to build.
///
/// - `FAKE_RUNTIME_LOG`: file receiving one argument per line, `---` after each call
/// - `FAKE_PULL_EXIT` / `FAKE_BUILD_EXIT`: exit codes for `pull` and the build
/// - `FAKE_SPEC_SNAPSHOT`: copy of the source directory's spec taken during the build
/// - `FAKE_BUILD_SLEEP`: seconds the build hangs after taking the snapshot
const FAKE_RUNTIME: &str = r#"#!/bin/sh
{
  for arg in "$@"; do printf '%s\n' "$arg"; done
  printf '%s\n' '---'
} >> "$FAKE_RUNTIME_LOG"

if [ "$1" = pull ]; then
  exit "${FAKE_PULL_EXIT:-0}"
fi

for arg in "$@"; do
  case "$arg" in
    '%{_rpmdir}') echo /root/rpmbuild/RPMS; exit 0 ;;
    '%{_sourcedir}') echo /root/rpmbuild/SOURCES; exit 0 ;;
  esac
done

if [ -n "$FAKE_SPEC_SNAPSHOT" ]; then
  cat "$FAKE_SOURCE_DIR"/*.spec > "$FAKE_SPEC_SNAPSHOT"
fi
if [ -n "$FAKE_BUILD_SLEEP" ]; then
  sleep "$FAKE_BUILD_SLEEP"
fi
echo "Wrote: /root/rpmbuild/RPMS/x86_64/foo-1.0-1.x86_64.rpm"
exit "${FAKE_BUILD_EXIT:-0}"
"#;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the source directory,
/// the fake runtime and its invocation log.
pub struct TestEnv {
  pub temp: TempDir,
  base: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let base = dunce::canonicalize(temp.path()).unwrap();
    std::fs::create_dir(base.join("src")).unwrap();

    let runtime = base.join("fake-docker");
    std::fs::write(&runtime, FAKE_RUNTIME).unwrap();
    std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();

    Self { temp, base }
  }

  pub fn source_path(&self) -> PathBuf {
    self.base.join("src")
  }

  /// Target directory; not created.
  pub fn target_path(&self) -> PathBuf {
    self.base.join("out").join("rpms")
  }

  pub fn snapshot_path(&self) -> PathBuf {
    self.base.join("spec-snapshot")
  }

  /// Write a file into the source directory.
  pub fn write_source(&self, name: &str, content: &str) {
    std::fs::write(self.source_path().join(name), content).unwrap();
  }

  /// Get a Command for `drb dir [flags] <image> <src> <target>` wired to the
  /// fake runtime. Runtime options can be appended after `--`.
  pub fn dir_cmd(&self, flags: &[&str]) -> Command {
    Command::from_std(self.dir_process(flags))
  }

  /// Same invocation as [`TestEnv::dir_cmd`], for tests that spawn and signal it.
  pub fn dir_process(&self, flags: &[&str]) -> std::process::Command {
    let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_drb"));
    cmd.env("DRB_CONTAINER_RUNTIME", self.base.join("fake-docker"));
    cmd.env_remove("DRB_SCRIPTS_DIR");
    cmd.env("FAKE_RUNTIME_LOG", self.base.join("runtime.log"));
    cmd.env("FAKE_SOURCE_DIR", self.source_path());
    cmd.env("FAKE_SPEC_SNAPSHOT", self.snapshot_path());
    cmd.arg("dir").args(flags);
    cmd.arg("fedora:40").arg(self.source_path()).arg(self.target_path());
    cmd
  }

  /// Arguments of every runtime invocation, in order.
  pub fn invocations(&self) -> Vec<Vec<String>> {
    let log = std::fs::read_to_string(self.base.join("runtime.log")).unwrap_or_default();
    let mut calls = Vec::new();
    let mut current = Vec::new();
    for line in log.lines() {
      if line == "---" {
        calls.push(std::mem::take(&mut current));
      } else {
        current.push(line.to_string());
      }
    }
    calls
  }

  /// Volume specs (`-v` values) of one invocation.
  pub fn volumes(call: &[String]) -> Vec<String> {
    call.windows(2).filter(|w| w[0] == "-v").map(|w| w[1].clone()).collect()
  }
}
