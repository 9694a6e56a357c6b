//! Access to files under the `content/` directory.
//!
//! `build.rs` copies `content/` next to the build output, so files are read
//! from there rather than from the source tree.
use std::path::{Path, PathBuf};

use tracing::info;

/// Full path of `file_path` relative to the content directory. Absolute paths
/// are returned unchanged.
pub fn content_path<P>(file_path: P) -> PathBuf
where
    P: AsRef<Path>,
{
    Path::new(env!("OUT_DIR")).join("content").join(file_path)
}

/// Loads a file relative to the content directory, and returns it as a string.
pub fn load_as_string<P>(file_path: P) -> std::io::Result<String>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    info!("load file as string: {file_path:?}");
    std::fs::read_to_string(content_path(file_path))
}

/// Loads a file relative to the content directory, and returns it as a vector
/// of bytes.
pub fn load_as_binary<P>(file_path: P) -> std::io::Result<Vec<u8>>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    info!("load file as binary: {file_path:?}");
    std::fs::read(content_path(file_path))
}
