//! Lazy traversal of partition directories and the data files inside them.

use crate::constraints::{Constraints, ProjectionMode};
use crate::error::{Error, Result};
use crate::partition::{PartitionStrategy, StorageKey};
use crate::predicate::Predicate;
use crate::storage::FileSystem;
use crate::value::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::vec;
use tracing::trace;

/// Depth-first walk over the partition directories a set of constraints
/// selects.
///
/// Yields `(key, path)` for every leaf directory in the order each level's
/// partitioner sorts its values. Directories whose names do not parse as a
/// partition value, and hidden ones, are skipped. An unpartitioned dataset
/// yields its root once, with an empty key.
pub struct PartitionIterator {
    fs: Arc<dyn FileSystem>,
    strategy: Option<PartitionStrategy>,
    filters: Vec<Option<Predicate>>,
    pending: Vec<(StorageKey, PathBuf)>,
    finished: bool,
}

impl PartitionIterator {
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        root: PathBuf,
        strategy: Option<&PartitionStrategy>,
        constraints: &Constraints,
    ) -> Self {
        let filters = strategy.map_or_else(Vec::new, |s| {
            constraints.project(s, ProjectionMode::Read)
        });
        Self {
            fs,
            strategy: strategy.cloned(),
            filters,
            pending: vec![(StorageKey::empty(), root)],
            finished: false,
        }
    }

    /// Yields `dir` alone, as an unpartitioned root would be.
    pub(crate) fn single(fs: Arc<dyn FileSystem>, dir: PathBuf) -> Self {
        Self::new(fs, dir, None, &Constraints::new())
    }

    fn depth(&self) -> usize {
        self.strategy.as_ref().map_or(0, PartitionStrategy::len)
    }
}

impl Iterator for PartitionIterator {
    type Item = Result<(StorageKey, PathBuf)>;

    fn next(&mut self) -> Option<Self::Item> {
        let leaf_depth = self.depth();
        loop {
            if self.finished {
                return None;
            }
            let Some((key, path)) = self.pending.pop() else {
                self.finished = true;
                return None;
            };

            let depth = key.len();
            let partitioner = match self.strategy.as_ref().and_then(|s| s.level(depth)) {
                Some(partitioner) if depth < leaf_depth => partitioner,
                _ => return Some(Ok((key, path))),
            };

            let entries = match self.fs.list(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(Error::enumeration(path, e)));
                }
            };

            let filter = self.filters.get(depth).and_then(Option::as_ref);
            let mut children: Vec<(Value, String)> = entries
                .into_iter()
                .filter(|entry| entry.is_dir && !is_hidden(&entry.name))
                .filter_map(|entry| {
                    let value = partitioner.parse_segment(&entry.name)?;
                    Some((value, entry.name))
                })
                .filter(|(value, _)| filter.map_or(true, |p| p.matches(value)))
                .collect();
            children.sort_by(|a, b| partitioner.compare(&a.0, &b.0));
            trace!(
                path = %path.display(),
                depth,
                selected = children.len(),
                "Listed partition level"
            );

            // stack order: first child is popped first
            for (value, name) in children.into_iter().rev() {
                self.pending.push((key.child(value), path.join(name)));
            }
        }
    }
}

/// True for names a writer never produces and readers never consume.
fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Iterates the data files of every selected partition.
///
/// Files are yielded partition by partition, sorted by name within each.
/// Subdirectories and hidden files are skipped.
pub struct PathIterator {
    fs: Arc<dyn FileSystem>,
    partitions: PartitionIterator,
    files: vec::IntoIter<PathBuf>,
    finished: bool,
}

impl PathIterator {
    pub(crate) fn new(fs: Arc<dyn FileSystem>, partitions: PartitionIterator) -> Self {
        Self {
            fs,
            partitions,
            files: Vec::new().into_iter(),
            finished: false,
        }
    }
}

impl Iterator for PathIterator {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(file) = self.files.next() {
                return Some(Ok(file));
            }

            let dir = match self.partitions.next() {
                Some(Ok((_, dir))) => dir,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            };

            let entries = match self.fs.list(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(Error::enumeration(dir, e)));
                }
            };
            let mut names: Vec<String> = entries
                .into_iter()
                .filter(|entry| !entry.is_dir && !is_hidden(&entry.name))
                .map(|entry| entry.name)
                .collect();
            names.sort();
            self.files = names
                .into_iter()
                .map(|name| dir.join(name))
                .collect::<Vec<_>>()
                .into_iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Bucket;
    use crate::predicate::Range;
    use crate::storage::MemoryFileSystem;
    use crate::value::ValueKind;
    use std::path::Path;

    fn strategy() -> PartitionStrategy {
        PartitionStrategy::builder()
            .list("kind", vec![Bucket::of(["a", "b"]), Bucket::of(["c"])])
            .identity("year", ValueKind::Int)
            .build()
            .unwrap()
    }

    fn populated() -> Arc<MemoryFileSystem> {
        let fs = Arc::new(MemoryFileSystem::new());
        let dirs = [
            "/data/1/2024",
            "/data/0/2023",
            "/data/0/2024",
            "/data/x/2024",
            "/data/0/abc",
        ];
        for dir in dirs {
            fs.create_dir_all(Path::new(dir)).unwrap();
        }
        fs.open_write(Path::new("/data/0/stray.jsonl")).unwrap();
        fs.open_write(Path::new("/data/0/2024/b.jsonl")).unwrap();
        fs.open_write(Path::new("/data/0/2024/a.jsonl")).unwrap();
        fs.open_write(Path::new("/data/0/2024/_SUCCESS")).unwrap();
        fs.open_write(Path::new("/data/0/2024/.a.jsonl.crc")).unwrap();
        fs.open_write(Path::new("/data/1/2024/c.jsonl")).unwrap();
        fs
    }

    fn walk(fs: Arc<MemoryFileSystem>, strategy: &PartitionStrategy) -> PartitionIterator {
        PartitionIterator::new(fs, "/data".into(), Some(strategy), &Constraints::new())
    }

    fn partitions(fs: Arc<MemoryFileSystem>, constraints: &Constraints) -> Vec<StorageKey> {
        let strategy = strategy();
        PartitionIterator::new(fs, "/data".into(), Some(&strategy), constraints)
            .map(|p| p.unwrap().0)
            .collect()
    }

    #[test]
    fn test_walks_valid_partitions_in_order() {
        let keys = partitions(populated(), &Constraints::new());
        assert_eq!(
            keys,
            vec![
                StorageKey::from_iter([0, 2023]),
                StorageKey::from_iter([0, 2024]),
                StorageKey::from_iter([1, 2024]),
            ]
        );
    }

    #[test]
    fn test_prunes_levels() {
        let constraints = Constraints::new()
            .with("kind", Predicate::eq("c"))
            .with("year", Range::at_least(2024).into());
        assert_eq!(
            partitions(populated(), &constraints),
            vec![StorageKey::from_iter([1, 2024])]
        );
    }

    #[test]
    fn test_skips_hidden_directories() {
        let fs = Arc::new(MemoryFileSystem::new());
        for dir in ["/data/_temporary", "/data/.staging", "/data/eu"] {
            fs.create_dir_all(Path::new(dir)).unwrap();
        }
        let strategy = PartitionStrategy::builder()
            .identity("region", ValueKind::Str)
            .build()
            .unwrap();

        let keys: Vec<_> = walk(fs, &strategy).map(|p| p.unwrap().0).collect();
        assert_eq!(keys, vec![StorageKey::from_iter(["eu"])]);
    }

    #[test]
    fn test_unpartitioned_yields_root() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let all: Vec<_> = PartitionIterator::single(fs, "/flat".into())
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(all, vec![(StorageKey::empty(), PathBuf::from("/flat"))]);
    }

    #[test]
    fn test_listing_failure_ends_iteration() {
        let fs = populated();
        fs.fail_listing("/data/0");
        let strategy = strategy();
        let mut iter = walk(fs, &strategy);
        let err = iter.next().unwrap().unwrap_err();
        assert!(err.is_enumeration());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_paths_skip_hidden_files() {
        let fs = populated();
        let strategy = strategy();
        let partitions = walk(fs.clone(), &strategy);
        let paths: Vec<_> = PathIterator::new(fs, partitions)
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/data/0/2024/a.jsonl"),
                PathBuf::from("/data/0/2024/b.jsonl"),
                PathBuf::from("/data/1/2024/c.jsonl"),
            ]
        );
    }
}
