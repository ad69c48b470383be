//! `drb dir` integration tests.

use std::process::Stdio;
use std::time::{Duration, Instant};

use predicates::prelude::*;

use super::common::{RPM_DIR, SOURCE_DIR, TestEnv};

const SPEC: &str = "Name: foo\nVersion: 1.0\nRelease: 1\n";

#[test]
fn static_spec_build() {
  let env = TestEnv::new();
  env.write_source("foo.spec", SPEC);

  env
    .dir_cmd(&[])
    .assert()
    .success()
    .stdout(predicate::str::contains("Wrote: /root/rpmbuild/RPMS"))
    .stdout(predicate::str::contains("Build complete"));

  assert!(env.target_path().is_dir(), "target directory is created");
  assert_eq!(std::fs::read_to_string(env.source_path().join("foo.spec")).unwrap(), SPEC);

  let calls = env.invocations();
  assert_eq!(calls.len(), 3);
  assert_eq!(calls[0], vec!["run", "--rm", "fedora:40", "rpm", "--eval", "%{_rpmdir}"]);
  assert_eq!(calls[1], vec!["run", "--rm", "fedora:40", "rpm", "--eval", "%{_sourcedir}"]);

  let build = &calls[2];
  let volumes = TestEnv::volumes(build);
  assert_eq!(volumes.len(), 3);
  assert!(volumes[0].ends_with(":/dockerscripts:ro"), "{}", volumes[0]);
  assert_eq!(volumes[1], format!("{}:{}", env.source_path().display(), SOURCE_DIR));
  assert_eq!(volumes[2], format!("{}:{}", env.target_path().display(), RPM_DIR));
  assert!(!build.contains(&"-t".to_string()));
  assert_eq!(build[build.len() - 2], "./rpmbuild-dir-in-docker.sh");
}

#[test]
fn build_exit_code_is_mirrored() {
  let env = TestEnv::new();
  env.write_source("foo.spec", SPEC);

  env
    .dir_cmd(&[])
    .env("FAKE_BUILD_EXIT", "3")
    .assert()
    .code(3)
    .stderr(predicate::str::contains("build failed"));
}

#[test]
fn template_is_generated_for_the_build_and_removed() {
  let env = TestEnv::new();
  env.write_source("foo.spectemplate", "Name: foo\nVersion: $${PKG_VERSION}\n");

  env.dir_cmd(&[]).env("PKG_VERSION", "4.2").assert().success();

  assert_eq!(
    std::fs::read_to_string(env.snapshot_path()).unwrap(),
    "Name: foo\nVersion: 4.2\n"
  );
  assert!(!env.source_path().join("foo.spec").exists());
  assert!(env.source_path().join("foo.spectemplate").exists());
}

#[test]
fn generated_spec_removed_after_failed_build() {
  let env = TestEnv::new();
  env.write_source("foo.spectemplate", "Version: $${PKG_VERSION}\n");

  env
    .dir_cmd(&[])
    .env("PKG_VERSION", "4.2")
    .env("FAKE_BUILD_EXIT", "1")
    .assert()
    .code(1);

  assert_eq!(std::fs::read_to_string(env.snapshot_path()).unwrap(), "Version: 4.2\n");
  assert!(!env.source_path().join("foo.spec").exists());
}

#[test]
fn interrupt_removes_generated_spec() {
  let env = TestEnv::new();
  env.write_source("foo.spectemplate", "Version: $${PKG_VERSION}\n");

  let mut child = env
    .dir_process(&[])
    .env("PKG_VERSION", "4.2")
    .env("FAKE_BUILD_SLEEP", "30")
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .unwrap();

  // the build is running once the fake runtime has copied the spec
  let deadline = Instant::now() + Duration::from_secs(20);
  while std::fs::read_to_string(env.snapshot_path()).unwrap_or_default().is_empty() {
    assert!(Instant::now() < deadline, "build never started");
    std::thread::sleep(Duration::from_millis(20));
  }
  assert!(env.source_path().join("foo.spec").exists());

  let sent = std::process::Command::new("kill")
    .args(["-INT", &child.id().to_string()])
    .status()
    .unwrap();
  assert!(sent.success());

  let deadline = Instant::now() + Duration::from_secs(10);
  let status = loop {
    if let Some(status) = child.try_wait().unwrap() {
      break status;
    }
    if Instant::now() >= deadline {
      child.kill().unwrap();
      panic!("drb kept running after SIGINT");
    }
    std::thread::sleep(Duration::from_millis(20));
  };

  assert_eq!(status.code(), Some(130));
  assert!(!env.source_path().join("foo.spec").exists());
  assert!(env.source_path().join("foo.spectemplate").exists());
}

#[test]
fn failed_pull_does_not_stop_the_build() {
  let env = TestEnv::new();
  env.write_source("foo.spec", SPEC);

  env
    .dir_cmd(&["--always-pull"])
    .env("FAKE_PULL_EXIT", "1")
    .assert()
    .success()
    .stderr(predicate::str::contains("image refresh failed"));

  let calls = env.invocations();
  assert_eq!(calls.len(), 4);
  assert_eq!(calls[0], vec!["pull", "fedora:40"]);
}

#[test]
fn additional_options_are_passed_through() {
  let env = TestEnv::new();
  env.write_source("foo.spec", SPEC);

  env
    .dir_cmd(&[])
    .args(["--", "--dns=192.168.1.1", "--memory=2g"])
    .assert()
    .success();

  let calls = env.invocations();
  assert_eq!(calls[2][..4], ["run", "--rm", "--dns=192.168.1.1", "--memory=2g"]);
}

#[test]
fn ambiguous_layout_never_reaches_the_runtime() {
  let env = TestEnv::new();
  env.write_source("a.spec", SPEC);
  env.write_source("b.spec", SPEC);

  env
    .dir_cmd(&[])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("more than one .spec"));

  assert!(env.invocations().is_empty());
  assert!(!env.target_path().exists());
}

#[test]
fn json_summary() {
  let env = TestEnv::new();
  env.write_source("foo.spec", SPEC);

  env
    .dir_cmd(&["--output", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"generated\": false"))
    .stdout(predicate::str::contains("\"rpm_dir\": \"/root/rpmbuild/RPMS\""));
}

#[test]
fn external_scripts_dir_is_mounted() {
  let env = TestEnv::new();
  env.write_source("foo.spec", SPEC);
  let scripts = env.temp.path().join("scripts");
  std::fs::create_dir(&scripts).unwrap();
  std::fs::write(scripts.join("rpmbuild-dir-in-docker.sh"), "#!/bin/sh\n").unwrap();
  let scripts = dunce::canonicalize(scripts).unwrap();

  env.dir_cmd(&[]).env("DRB_SCRIPTS_DIR", &scripts).assert().success();

  let volumes = TestEnv::volumes(&env.invocations()[2]);
  assert_eq!(volumes[0], format!("{}:/dockerscripts:ro", scripts.display()));
}
