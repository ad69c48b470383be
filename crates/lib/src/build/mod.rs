//! The `dir` build pipeline.
//!
//! A build turns a source directory holding one `.spec` (or one
//! `.spectemplate`) into binary RPMs written to a target directory, by running
//! `rpmbuild` inside a container image.
//!
//! # Submodules
//!
//! - [`execute`] - The pipeline itself
//! - [`spec`] - Spec discovery and template generation
//! - [`types`] - Requests, outcomes and errors

pub mod execute;
pub mod spec;
mod types;

pub use execute::build;
pub use spec::{GeneratedSpec, SpecFile, SpecLayout, SpecSource};
pub use types::*;
