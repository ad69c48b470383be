//! The build pipeline.
//!
//! Order matters: everything that can be checked about the source layout is
//! checked before the target directory is created or a spec is generated,
//! and a generated spec is removed whatever happens afterwards.

use std::fs;

use tracing::{info, warn};

use crate::build::spec::{GeneratedSpec, SpecFile, SpecLayout, SpecSource};
use crate::build::types::{BuildError, BuildOutcome, BuildRequest};
use crate::config::Config;
use crate::consts::{ENTRYPOINT, SCRIPTS_MOUNT};
use crate::params::{self, Parameters};
use crate::runtime::{ContainerRuntime, Invoker, Mount, RunCommand};
use crate::scripts::ScriptsDir;
use crate::signing::EncodedSigningKey;
use crate::sources::SourceDownloader;
use crate::template::Variables;

/// `BASH_ON_FAIL` value asking the container to spawn a shell on failure.
pub const BASH_ON_FAIL_SPAWN: &str = "bashonfail";

/// `BASH_ON_FAIL` value for batch builds.
pub const BASH_ON_FAIL_NONE: &str = "dontspawn";

/// Run one build request to completion.
///
/// `vars` supplies values for template placeholders; callers normally pass
/// the process environment.
pub async fn build(
  request: &BuildRequest,
  config: &Config,
  vars: &impl Variables,
  invoker: &impl Invoker,
  downloader: &impl SourceDownloader,
) -> Result<BuildOutcome, BuildError> {
  let source_dir = request.source_dir();

  let selected = SpecLayout::scan(source_dir)?.select(source_dir)?;

  let target_dir = request.target_dir();
  if !target_dir.is_dir() {
    info!(path = %target_dir.display(), "creating target directory");
    fs::create_dir_all(target_dir).map_err(BuildError::io(target_dir))?;
  }

  let spec = match selected {
    SpecSource::Static(path) => SpecFile::Static(path),
    SpecSource::Template(template) => SpecFile::Generated(GeneratedSpec::generate(&template, vars)?),
  };

  let result = build_with_spec(request, config, &spec, invoker, downloader).await;
  spec.cleanup();
  result
}

async fn build_with_spec(
  request: &BuildRequest,
  config: &Config,
  spec: &SpecFile,
  invoker: &impl Invoker,
  downloader: &impl SourceDownloader,
) -> Result<BuildOutcome, BuildError> {
  let image = request.image();

  if request.download_sources() {
    downloader.download_sources(request.source_dir(), spec.path()).await?;
  }

  let signing_key = EncodedSigningKey::provide(request.sign_with())?;
  let token = build_parameters(request, signing_key).encode()?;

  let runtime = ContainerRuntime::locate(&config.runtime)?;

  if request.always_pull() {
    // best effort: a stale local image still builds
    if let Err(e) = runtime.pull(invoker, image).await {
      warn!(image = %image, error = %e, "image refresh failed, using local image");
    }
  }

  let image_dirs = runtime.image_dirs(invoker, image).await?;
  let scripts = ScriptsDir::prepare(config.scripts_dir.as_deref())?;

  let cmd = RunCommand::new(image)
    .extra_options(request.extra_options().iter().cloned())
    .mount(Mount::new(scripts.path(), SCRIPTS_MOUNT).read_only())
    .mount(Mount::new(request.source_dir(), image_dirs.source_dir.clone()))
    .mount(Mount::new(request.target_dir(), image_dirs.rpm_dir.clone()))
    .interactive(request.bash_on_failure())
    .workdir(SCRIPTS_MOUNT)
    .command([ENTRYPOINT.to_string(), token]);

  info!(
    source = %request.source_dir().display(),
    spec = %spec.path().display(),
    image = %image,
    "building"
  );
  let output = runtime.run(invoker, &cmd).await?;
  info!(target = %request.target_dir().display(), "build finished");

  Ok(BuildOutcome {
    spec: spec.path().to_path_buf(),
    generated: spec.is_generated(),
    image_dirs,
    output,
  })
}

/// Parameters handed to the container entry point.
pub fn build_parameters(request: &BuildRequest, signing_key: EncodedSigningKey) -> Parameters {
  let bash_on_fail = if request.bash_on_failure() {
    BASH_ON_FAIL_SPAWN
  } else {
    BASH_ON_FAIL_NONE
  };

  let mut params = Parameters::new();
  params
    .set(params::CALLING_UID, request.uid())
    .set(params::CALLING_GID, request.gid())
    .set(params::BASH_ON_FAIL, bash_on_fail)
    .set(params::GPG_PRIVATE_KEY, signing_key);
  params
}
