/// Name used for temporary files and directories.
pub const APP_NAME: &str = "drb";

/// Suffix of static specification files.
pub const SPEC_SUFFIX: &str = "spec";

/// Suffix of specification templates expanded before the build.
pub const TEMPLATE_SUFFIX: &str = "spectemplate";

/// Mount point of the helper-script directory inside the container.
pub const SCRIPTS_MOUNT: &str = "/dockerscripts";

/// Entry point executed inside the container, relative to [`SCRIPTS_MOUNT`].
pub const ENTRYPOINT: &str = "./rpmbuild-dir-in-docker.sh";

/// Default container runtime executable.
pub const DEFAULT_RUNTIME: &str = "docker";
