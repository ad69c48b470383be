//! Implementation of the `drb dir` command.
//!
//! Builds binary RPMs from a source directory holding exactly one `.spec` or
//! one `.spectemplate`, inside a container image.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::warn;

use drb_lib::build::{BuildOptions, BuildOutcome, BuildRequest, build};
use drb_lib::config::{self, Config};
use drb_lib::runtime::{ImageDirs, RunOutput, SystemInvoker};
use drb_lib::sources::HttpDownloader;

use crate::output::{OutputFormat, format_duration, print_info, print_json, print_stat, print_success};

#[derive(Args, Debug)]
pub struct DirArgs {
  /// Image to build in, e.g. alanfranz/drb-epel-7-x86-64:latest
  pub image: String,

  /// Directory with one .spec or .spectemplate and any local sources
  pub source_directory: PathBuf,

  /// Directory receiving the built RPMs (created if missing)
  pub target_directory: PathBuf,

  /// Options passed verbatim to the container runtime's `run`, after `--`
  #[arg(last = true, allow_hyphen_values = true, value_name = "RUNTIME_OPTIONS")]
  pub additional_options: Vec<String>,

  /// Download remote Source/Patch URLs into the source directory first
  #[arg(long)]
  pub download_sources: bool,

  /// Drop into an interactive shell in the container if the build fails
  #[arg(long)]
  pub bash_on_failure: bool,

  /// Sign the built packages with this GPG private key
  #[arg(long, value_name = "PATH")]
  pub sign_with: Option<PathBuf>,

  /// Pull the image before building; a failed pull is not fatal
  #[arg(long)]
  pub always_pull: bool,

  /// Owner uid for the built packages (default: the calling user)
  #[arg(long)]
  pub uid: Option<u32>,

  /// Owner gid for the built packages (default: the calling group)
  #[arg(long)]
  pub gid: Option<u32>,

  /// Output format for the summary
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

/// The build was abandoned on SIGINT.
#[derive(Debug)]
pub struct Interrupted;

impl Interrupted {
  /// Shell convention for death by SIGINT.
  pub const EXIT_CODE: u8 = 130;
}

impl fmt::Display for Interrupted {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("interrupted")
  }
}

impl std::error::Error for Interrupted {}

#[derive(Serialize)]
struct DirOutput {
  image: String,
  spec: String,
  generated: bool,
  target: String,
  #[serde(flatten)]
  image_dirs: ImageDirs,
  elapsed_ms: u128,
  log: Option<String>,
}

/// Execute the dir command.
///
/// `env` is the substitution mapping for `.spectemplate` placeholders.
pub fn cmd_dir(args: DirArgs, config: &Config, env: &HashMap<String, String>) -> Result<()> {
  let output = args.output;
  let options = BuildOptions {
    image: args.image,
    source_dir: args.source_directory,
    target_dir: args.target_directory,
    extra_options: args.additional_options,
    download_sources: args.download_sources,
    bash_on_failure: args.bash_on_failure,
    always_pull: args.always_pull,
    sign_with: args.sign_with,
    uid: args.uid.unwrap_or_else(config::calling_uid),
    gid: args.gid.unwrap_or_else(config::calling_gid),
  };
  let request = BuildRequest::new(options)?;

  if !output.is_json() {
    print_info(&format!(
      "Building {} in {}",
      request.source_dir().display(),
      request.image()
    ));
  }

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;

  let started = Instant::now();
  let downloader = HttpDownloader::new();
  let outcome = rt.block_on(async {
    // dropping the build future removes a generated spec and kills a captured build
    tokio::select! {
      biased;
      Ok(()) = tokio::signal::ctrl_c() => {
        warn!(source = %request.source_dir().display(), "interrupted, abandoning build");
        Err(anyhow::Error::new(Interrupted))
      }
      result = build(&request, config, env, &SystemInvoker, &downloader) => result.map_err(anyhow::Error::from),
    }
  })?;
  let elapsed = started.elapsed();

  if output.is_json() {
    print_json(&summary(&request, outcome, elapsed.as_millis()))?;
    return Ok(());
  }

  if let RunOutput::Captured(ref log) = outcome.output {
    print!("{}", log);
  }

  print_success("Build complete");
  let spec = if outcome.generated {
    format!("{} (generated, removed)", outcome.spec.display())
  } else {
    outcome.spec.display().to_string()
  };
  print_stat("Spec", &spec);
  print_stat("Target", &request.target_dir().display().to_string());
  print_stat("Elapsed", &format_duration(elapsed));

  Ok(())
}

fn summary(request: &BuildRequest, outcome: BuildOutcome, elapsed_ms: u128) -> DirOutput {
  DirOutput {
    image: request.image().to_string(),
    spec: outcome.spec.display().to_string(),
    generated: outcome.generated,
    target: request.target_dir().display().to_string(),
    image_dirs: outcome.image_dirs,
    elapsed_ms,
    log: match outcome.output {
      RunOutput::Captured(log) => Some(log),
      RunOutput::Attached => None,
    },
  }
}
