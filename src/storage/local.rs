//! Local filesystem backend.

use super::{DirEntry, FileSystem};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Backend over `std::fs`. Paths are used as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn absent_as<T>(result: io::Result<T>, absent: T) -> io::Result<T> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(absent),
        other => other,
    }
}

impl FileSystem for LocalFileSystem {
    fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut results = Vec::new();
        for entry in entries {
            let entry = entry?;
            // names that are not valid UTF-8 cannot be partition values
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let is_dir = entry.file_type()?.is_dir();
            results.push(DirEntry { name, is_dir });
        }
        Ok(results)
    }

    fn delete(&self, path: &Path, recursive: bool) -> io::Result<bool> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let removed = if !metadata.is_dir() {
            fs::remove_file(path)
        } else if recursive {
            fs::remove_dir_all(path)
        } else {
            fs::remove_dir(path)
        };
        // a concurrent delete may win the race
        absent_as(removed.map(|_| true), false)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        absent_as(fs::symlink_metadata(path).map(|_| true), false)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(fs::File::create(path)?))
    }
}
