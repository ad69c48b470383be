//! drb-lib: build RPMs from a source directory inside a container
//!
//! The pieces a `dir` build is made of:
//! - `template`: `$${NAME}` expansion of `.spectemplate` files
//! - `params`: the parameter token handed to the container entry point
//! - `signing`: optional GPG key provisioning
//! - `runtime`: container runtime invocation
//! - `build`: the pipeline tying them together, including cleanup

pub mod build;
pub mod config;
pub mod consts;
pub mod params;
pub mod runtime;
pub mod scripts;
pub mod signing;
pub mod sources;
pub mod template;
pub mod util;
