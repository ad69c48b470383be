mod dir;

pub use dir::{DirArgs, Interrupted, cmd_dir};
