mod cmd;
mod output;

use std::collections::HashMap;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use drb_lib::build::BuildError;
use drb_lib::config::Config;

use cmd::{DirArgs, Interrupted};
use output::print_error;

/// drb - build RPMs from a directory inside a container
#[derive(Parser)]
#[command(name = "drb")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build binary RPMs from a source directory
  ///
  /// The source directory must hold exactly one .spec or exactly one
  /// .spectemplate. Placeholders of the form $${NAME} in a template are
  /// replaced with environment variables; the generated .spec is removed
  /// once the build ends.
  ///
  /// The container runtime is `docker` unless DRB_CONTAINER_RUNTIME names
  /// another executable. Every container is started with --rm, so the build
  /// container is removed when the run ends, including after a
  /// --bash-on-failure shell.
  ///
  /// On Ctrl-C the build is abandoned, the generated .spec is removed and
  /// drb exits with 130.
  Dir(DirArgs),
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  let config = Config::from_env();
  let env: HashMap<String, String> = std::env::vars_os()
    .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
    .collect();

  let result = match cli.command {
    Commands::Dir(args) => cmd::cmd_dir(args, &config, &env),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      exit_code(&err)
    }
  }
}

/// Mirror the build's own exit status; 130 on interrupt, everything else is 1.
fn exit_code(err: &anyhow::Error) -> ExitCode {
  if err.is::<Interrupted>() {
    return ExitCode::from(Interrupted::EXIT_CODE);
  }
  err
    .downcast_ref::<BuildError>()
    .and_then(BuildError::exit_code)
    .and_then(|code| u8::try_from(code).ok())
    .filter(|&code| code != 0)
    .map_or(ExitCode::FAILURE, ExitCode::from)
}
