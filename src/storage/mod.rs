//! Hierarchical storage backends.
//!
//! Views never touch `std::fs` directly; every list, delete, open and
//! directory creation goes through a [`FileSystem`], so datasets can live on
//! a local disk or in memory.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;

pub mod local;
pub mod memory;

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }
}

/// Raw storage operations consumed by views.
///
/// Implementations may be shared by many threads and processes; no
/// operation is expected to be atomic with respect to another.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Lists the direct children of a directory. A missing directory lists
    /// as empty.
    fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Deletes a file or directory. Returns `Ok(false)` if nothing existed.
    fn delete(&self, path: &Path, recursive: bool) -> io::Result<bool>;

    /// Creates a directory and its ancestors; succeeds if it already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> io::Result<bool>;

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Creates or truncates a file. The parent directory must exist.
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;
}
