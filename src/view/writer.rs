//! Record writers over a view.
//!
//! Writers create directories and files lazily: nothing touches storage until
//! the first record arrives. Every data file gets a fresh unique name, so
//! concurrent writers never collide.

use crate::constraints::Constraints;
use crate::dataset::DatasetConfig;
use crate::error::{Error, Result};
use crate::partition::{PartitionStrategy, StorageKey};
use crate::storage::FileSystem;
use crate::value::Record;
use std::collections::{HashMap, VecDeque};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Sink for records.
///
/// `close` flushes and releases every open file. Writing after `close` is an
/// error. Dropping an unclosed writer flushes on a best-effort basis.
pub trait DatasetWriter: Send {
    fn write(&mut self, record: &Record) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

fn closed_error(path: PathBuf) -> Error {
    Error::io(path, io::Error::new(io::ErrorKind::Other, "writer is closed"))
}

struct OpenFile {
    path: PathBuf,
    out: BufWriter<Box<dyn Write + Send>>,
}

/// Writes records as JSON lines into a single new file in one directory.
pub struct FileWriter {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    extension: String,
    guard: Constraints,
    file: Option<OpenFile>,
    closed: bool,
}

impl FileWriter {
    /// # Arguments
    /// * `dir` - Directory the data file is created in, created if missing
    /// * `extension` - Data file extension, without the dot
    /// * `guard` - Records that do not match are rejected
    pub fn new(
        fs: Arc<dyn FileSystem>,
        dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        guard: Constraints,
    ) -> Self {
        Self {
            fs,
            dir: dir.into(),
            extension: extension.into(),
            guard,
            file: None,
            closed: false,
        }
    }

    /// Path of the data file, once the first record has been written.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    fn open(&mut self) -> Result<&mut OpenFile> {
        if self.file.is_none() {
            self.fs
                .create_dir_all(&self.dir)
                .map_err(|e| Error::io(&self.dir, e))?;
            let path = self
                .dir
                .join(format!("{}.{}", Uuid::new_v4(), self.extension));
            let out = self.fs.open_write(&path).map_err(|e| Error::io(&path, e))?;
            debug!(path = %path.display(), "Opened data file for writing");
            self.file = Some(OpenFile {
                path,
                out: BufWriter::new(out),
            });
        }
        self.file
            .as_mut()
            .ok_or_else(|| closed_error(self.dir.clone()))
    }
}

impl DatasetWriter for FileWriter {
    fn write(&mut self, record: &Record) -> Result<()> {
        if self.closed {
            return Err(closed_error(self.dir.clone()));
        }
        if !self.guard.matches(record) {
            return Err(Error::RecordOutsideView);
        }

        let file = self.open()?;
        let mut line = serde_json::to_vec(record).map_err(|source| Error::Format {
            path: file.path.clone(),
            source,
        })?;
        line.push(b'\n');
        file.out
            .write_all(&line)
            .map_err(|e| Error::io(&file.path, e))
    }

    fn flush(&mut self) -> Result<()> {
        match self.file.as_mut() {
            Some(file) => file.out.flush().map_err(|e| Error::io(&file.path, e)),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        match self.file.take() {
            Some(mut file) => file.out.flush().map_err(|e| Error::io(&file.path, e)),
            None => Ok(()),
        }
    }
}

/// Routes records to one file per partition.
///
/// The partition directory is created the first time its key is seen. At
/// most `max_open_writers` partition files stay open; opening one more
/// closes the least recently written.
pub struct PartitionedWriter {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    strategy: PartitionStrategy,
    guard: Constraints,
    config: DatasetConfig,
    writers: HashMap<StorageKey, FileWriter>,
    recency: VecDeque<StorageKey>,
    closed: bool,
}

impl PartitionedWriter {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        strategy: PartitionStrategy,
        guard: Constraints,
        config: DatasetConfig,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            strategy,
            guard,
            config,
            writers: HashMap::new(),
            recency: VecDeque::new(),
            closed: false,
        }
    }

    /// Number of partition files currently open.
    pub fn open_writers(&self) -> usize {
        self.writers.len()
    }

    fn touch(&mut self, key: &StorageKey) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(key.clone());
    }

    fn evict_if_full(&mut self) -> Result<()> {
        while self.writers.len() >= self.config.max_open_writers {
            let Some(oldest) = self.recency.pop_front() else {
                break;
            };
            if let Some(mut writer) = self.writers.remove(&oldest) {
                debug!(partition = %oldest, "Closing least recently used partition writer");
                writer.close()?;
            }
        }
        Ok(())
    }
}

impl DatasetWriter for PartitionedWriter {
    fn write(&mut self, record: &Record) -> Result<()> {
        if self.closed {
            return Err(closed_error(self.root.clone()));
        }
        let key = self.strategy.key_for(record)?;
        if !self.guard.matches(record) {
            return Err(Error::RecordOutsideView);
        }

        if !self.writers.contains_key(&key) {
            self.evict_if_full()?;
            let dir = self.root.join(self.strategy.path_for(&key));
            let writer = FileWriter::new(
                Arc::clone(&self.fs),
                dir,
                self.config.data_file_extension.clone(),
                Constraints::new(),
            );
            self.writers.insert(key.clone(), writer);
        }
        self.touch(&key);

        match self.writers.get_mut(&key) {
            Some(writer) => writer.write(record),
            None => Err(closed_error(self.root.clone())),
        }
    }

    fn flush(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.recency.clear();
        let mut first_error = None;
        for (key, mut writer) in self.writers.drain() {
            if let Err(e) = writer.close() {
                warn!(partition = %key, error = %e, "Failed to close partition writer");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Bucket;
    use crate::storage::MemoryFileSystem;

    fn strategy() -> PartitionStrategy {
        PartitionStrategy::builder()
            .list("kind", vec![Bucket::of(["a"]), Bucket::of(["b"]), Bucket::of(["c"])])
            .build()
            .unwrap()
    }

    #[test]
    fn test_file_writer_is_lazy() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut writer = FileWriter::new(fs.clone(), "/flat", "jsonl", Constraints::new());
        writer.close().unwrap();
        assert_eq!(fs.mutations(), 0);
        assert!(writer.write(&Record::new().with("kind", "a")).is_err());
    }

    #[test]
    fn test_file_writer_writes_lines() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut writer = FileWriter::new(fs.clone(), "/flat", "jsonl", Constraints::new());
        writer.write(&Record::new().with("kind", "a").with("n", 1)).unwrap();
        writer.write(&Record::new().with("kind", "b").with("n", 2)).unwrap();
        writer.close().unwrap();

        let files = fs.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].parent(), Some(Path::new("/flat")));
        assert_eq!(files[0].extension().and_then(|e| e.to_str()), Some("jsonl"));
    }

    #[test]
    fn test_partitioned_writer_bounds_open_files() {
        let fs = Arc::new(MemoryFileSystem::new());
        let config = DatasetConfig::new("jsonl", 2).unwrap();
        let mut writer =
            PartitionedWriter::new(fs.clone(), "/data", strategy(), Constraints::new(), config);

        for kind in ["a", "b", "a", "c", "b"] {
            writer.write(&Record::new().with("kind", kind)).unwrap();
            assert!(writer.open_writers() <= 2);
        }
        writer.close().unwrap();
        assert_eq!(writer.open_writers(), 0);

        // "b" was evicted when "c" arrived and reopened with a new file
        let dirs: Vec<_> = fs
            .files()
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/data/0"),
                PathBuf::from("/data/1"),
                PathBuf::from("/data/1"),
                PathBuf::from("/data/2"),
            ]
        );
    }

    #[test]
    fn test_partitioned_writer_rejects_bad_records() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut writer = PartitionedWriter::new(
            fs.clone(),
            "/data",
            strategy(),
            Constraints::new().with("kind", crate::predicate::Predicate::eq("a")),
            DatasetConfig::default(),
        );

        let err = writer.write(&Record::new().with("kind", "z")).unwrap_err();
        assert!(err.is_invalid_value());
        let err = writer.write(&Record::new().with("kind", "b")).unwrap_err();
        assert!(matches!(err, Error::RecordOutsideView));
        assert_eq!(fs.mutations(), 0);
    }
}
