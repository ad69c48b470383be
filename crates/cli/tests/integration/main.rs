//! Integration tests for `drb dir` against a fake container runtime.

#![cfg(unix)]

mod common;
mod dir_tests;
