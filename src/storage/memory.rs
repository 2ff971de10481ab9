//! In-memory backend.
//!
//! Keeps the whole tree in a map behind a mutex. Every mutating call is
//! counted, and listings can be made to fail, which makes it convenient for
//! asserting exactly what a view did to storage.

use super::{DirEntry, FileSystem};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Arc<Mutex<Vec<u8>>>),
}

#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    failing_lists: Mutex<HashSet<PathBuf>>,
    mutations: AtomicUsize,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `delete`, `create_dir_all` and `open_write` calls so far.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Makes every later `list` of `path` fail.
    pub fn fail_listing(&self, path: impl Into<PathBuf>) {
        lock(&self.failing_lists).insert(path.into());
    }

    /// All file paths currently stored, in order.
    pub fn files(&self) -> Vec<PathBuf> {
        lock(&self.nodes)
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn touch(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// The filesystem root and bare relative prefixes always exist as directories.
fn is_implicit_dir(path: &Path) -> bool {
    path.parent().is_none() || path.as_os_str().is_empty()
}

fn descendants<'a>(
    nodes: &'a BTreeMap<PathBuf, Node>,
    path: &'a Path,
) -> impl Iterator<Item = (&'a PathBuf, &'a Node)> + 'a {
    nodes
        .range(path.to_path_buf()..)
        .skip_while(move |(p, _)| p.as_path() == path)
        .take_while(move |(p, _)| p.starts_with(path))
}

struct MemoryWriter {
    data: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.data).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileSystem for MemoryFileSystem {
    fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        if lock(&self.failing_lists).contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("listing {} failed", path.display()),
            ));
        }

        let nodes = lock(&self.nodes);
        if let Some(Node::File(_)) = nodes.get(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not a directory", path.display()),
            ));
        }
        Ok(descendants(&nodes, path)
            .filter(|(p, _)| p.parent() == Some(path))
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_str()?.to_string();
                Some(DirEntry {
                    name,
                    is_dir: matches!(node, Node::Dir),
                })
            })
            .collect())
    }

    fn delete(&self, path: &Path, recursive: bool) -> io::Result<bool> {
        self.touch();
        let mut nodes = lock(&self.nodes);
        if !nodes.contains_key(path) {
            return Ok(false);
        }

        let children: Vec<PathBuf> = descendants(&nodes, path).map(|(p, _)| p.clone()).collect();
        if !children.is_empty() && !recursive {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("directory {} is not empty", path.display()),
            ));
        }
        for child in children {
            nodes.remove(&child);
        }
        nodes.remove(path);
        Ok(true)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.touch();
        let mut nodes = lock(&self.nodes);
        for ancestor in path.ancestors().filter(|a| !is_implicit_dir(a)) {
            match nodes.get(ancestor) {
                Some(Node::Dir) => break,
                Some(Node::File(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} is a file", ancestor.display()),
                    ))
                }
                None => {
                    nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(is_implicit_dir(path) || lock(&self.nodes).contains_key(path))
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        match lock(&self.nodes).get(path) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(lock(data).clone()))),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )),
        }
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        self.touch();
        let mut nodes = lock(&self.nodes);
        let parent_exists = path.parent().map_or(true, |parent| {
            is_implicit_dir(parent) || matches!(nodes.get(parent), Some(Node::Dir))
        });
        if !parent_exists {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent of {} does not exist", path.display()),
            ));
        }
        if let Some(Node::Dir) = nodes.get(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            ));
        }

        let data = Arc::new(Mutex::new(Vec::new()));
        nodes.insert(path.to_path_buf(), Node::File(Arc::clone(&data)));
        Ok(Box::new(MemoryWriter { data }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read() {
        let fs = MemoryFileSystem::new();
        fs.create_dir_all(Path::new("/data/0")).unwrap();
        let mut writer = fs.open_write(Path::new("/data/0/a.jsonl")).unwrap();
        writer.write_all(b"hello").unwrap();
        drop(writer);

        let mut data = String::new();
        fs.open_read(Path::new("/data/0/a.jsonl"))
            .unwrap()
            .read_to_string(&mut data)
            .unwrap();
        assert_eq!(data, "hello");
    }

    #[test]
    fn test_open_write_requires_parent() {
        let fs = MemoryFileSystem::new();
        assert!(fs.open_write(Path::new("/data/0/a.jsonl")).is_err());
    }

    #[test]
    fn test_list_direct_children_only() {
        let fs = MemoryFileSystem::new();
        fs.create_dir_all(Path::new("/data/0/7")).unwrap();
        fs.create_dir_all(Path::new("/data/1")).unwrap();
        fs.create_dir_all(Path::new("/data0")).unwrap();
        fs.open_write(Path::new("/data/f")).unwrap();

        let entries = fs.list(Path::new("/data")).unwrap();
        assert_eq!(
            entries,
            vec![DirEntry::dir("0"), DirEntry::dir("1"), DirEntry::file("f")]
        );
        assert!(fs.list(Path::new("/missing")).unwrap().is_empty());
        assert_eq!(
            fs.list(Path::new("/")).unwrap(),
            vec![DirEntry::dir("data"), DirEntry::dir("data0")]
        );
    }

    #[test]
    fn test_delete_recursive() {
        let fs = MemoryFileSystem::new();
        fs.create_dir_all(Path::new("/data/0")).unwrap();
        fs.open_write(Path::new("/data/0/a")).unwrap();

        assert!(fs.delete(Path::new("/data"), false).is_err());
        assert!(fs.delete(Path::new("/data/0"), true).unwrap());
        assert!(fs.files().is_empty());
        assert!(fs.exists(Path::new("/data")).unwrap());
        assert!(!fs.delete(Path::new("/data/0"), true).unwrap());
    }

    #[test]
    fn test_mutation_count_and_failures() {
        let fs = MemoryFileSystem::new();
        assert_eq!(fs.mutations(), 0);
        fs.create_dir_all(Path::new("/data")).unwrap();
        fs.list(Path::new("/data")).unwrap();
        assert_eq!(fs.mutations(), 1);

        fs.fail_listing("/data");
        assert!(fs.list(Path::new("/data")).is_err());
    }
}
