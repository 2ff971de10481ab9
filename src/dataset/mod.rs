//! Datasets: a named directory tree with an optional partition strategy.
//!
//! A [`Dataset`] is a cheap, shareable handle. Views created from it refer
//! to the same root and backend; none of them own it.

use crate::error::{Error, Result};
use crate::partition::{PartitionError, PartitionStrategy, StorageKey};
use crate::storage::FileSystem;
use crate::view::{DatasetReader, DatasetWriter, PartitionIterator, View};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod config;

pub use config::DatasetConfig;

/// Describes how a dataset lays out its data.
#[derive(Debug, Clone, Default)]
pub struct DatasetDescriptor {
    partition_strategy: Option<PartitionStrategy>,
}

impl DatasetDescriptor {
    /// An unpartitioned layout: data files live directly under the root.
    pub fn unpartitioned() -> Self {
        Self::default()
    }

    /// A partitioned layout, one directory level per strategy level.
    pub fn partitioned(strategy: PartitionStrategy) -> Self {
        Self {
            partition_strategy: Some(strategy),
        }
    }

    pub fn partition_strategy(&self) -> Option<&PartitionStrategy> {
        self.partition_strategy.as_ref()
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_strategy.is_some()
    }
}

/// A single partition directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    key: StorageKey,
    path: PathBuf,
}

impl Partition {
    pub(crate) fn new(key: StorageKey, path: PathBuf) -> Self {
        Self { key, path }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct DatasetInner {
    name: String,
    root: PathBuf,
    descriptor: DatasetDescriptor,
    config: DatasetConfig,
    fs: Arc<dyn FileSystem>,
}

/// Shareable handle to a dataset.
#[derive(Clone)]
pub struct Dataset {
    inner: Arc<DatasetInner>,
}

impl Dataset {
    /// Opens a dataset with the default configuration.
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        descriptor: DatasetDescriptor,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self::with_config(name, root, descriptor, DatasetConfig::default(), fs)
    }

    pub fn with_config(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        descriptor: DatasetDescriptor,
        config: DatasetConfig,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            inner: Arc::new(DatasetInner {
                name: name.into(),
                root: root.into(),
                descriptor,
                config,
                fs,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.inner.descriptor
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.inner.config
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.inner.fs
    }

    pub fn is_partitioned(&self) -> bool {
        self.inner.descriptor.is_partitioned()
    }

    /// An unconstrained view over the whole dataset.
    pub fn view(&self) -> View {
        View::new(self.clone())
    }

    pub fn new_reader(&self) -> DatasetReader {
        self.view().new_reader()
    }

    pub fn new_writer(&self) -> Box<dyn DatasetWriter> {
        self.view().new_writer()
    }

    /// Enumerates every partition currently on storage.
    pub fn partitions(&self) -> PartitionIterator {
        self.view().partitions()
    }

    /// Looks up a partition by key.
    ///
    /// # Arguments
    /// * `key` - One valid partition value per strategy level
    /// * `auto_create` - Create the partition directory if it is missing
    ///
    /// # Returns
    /// The partition, or `None` if it does not exist and `auto_create` is false
    pub fn partition(&self, key: &StorageKey, auto_create: bool) -> Result<Option<Partition>> {
        let strategy = self.descriptor().partition_strategy().ok_or_else(|| {
            PartitionError::InvalidKey(format!("dataset {} is not partitioned", self.name()))
        })?;
        strategy.validate_key(key)?;

        let path = self.root().join(strategy.path_for(key));
        let fs = self.file_system();
        if fs.exists(&path).map_err(|e| Error::io(&path, e))? {
            return Ok(Some(Partition::new(key.clone(), path)));
        }
        if !auto_create {
            return Ok(None);
        }
        fs.create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
        tracing::debug!(dataset = self.name(), partition = %key, "Created partition");
        Ok(Some(Partition::new(key.clone(), path)))
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.inner.name)
            .field("root", &self.inner.root)
            .field("descriptor", &self.inner.descriptor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Bucket;
    use crate::storage::MemoryFileSystem;
    use crate::value::Value;

    fn dataset(fs: Arc<MemoryFileSystem>) -> Dataset {
        let strategy = PartitionStrategy::builder()
            .list("kind", vec![Bucket::of(["a", "b"]), Bucket::of(["c"])])
            .build()
            .unwrap();
        Dataset::new("events", "/data", DatasetDescriptor::partitioned(strategy), fs)
    }

    #[test]
    fn test_surface() {
        let ds = dataset(Arc::new(MemoryFileSystem::new()));
        assert_eq!(ds.name(), "events");
        assert_eq!(ds.root(), Path::new("/data"));
        assert!(ds.is_partitioned());
        assert_eq!(ds.config(), &DatasetConfig::default());
        assert!(ds.view().constraints().is_empty());
    }

    #[test]
    fn test_partition_lookup_and_auto_create() {
        let fs = Arc::new(MemoryFileSystem::new());
        let ds = dataset(fs.clone());
        let key = StorageKey::new(vec![Value::Int(1)]);

        assert_eq!(ds.partition(&key, false).unwrap(), None);
        let created = ds.partition(&key, true).unwrap().unwrap();
        assert_eq!(created.path(), Path::new("/data/1"));
        assert_eq!(created.key(), &key);
        assert_eq!(ds.partition(&key, false).unwrap(), Some(created));

        let listed: Vec<_> = ds.partitions().map(|p| p.unwrap().0).collect();
        assert_eq!(listed, vec![key]);
    }

    #[test]
    fn test_partition_rejects_invalid_key() {
        let ds = dataset(Arc::new(MemoryFileSystem::new()));
        let err = ds.partition(&StorageKey::new(vec![Value::Int(7)]), true).unwrap_err();
        assert!(matches!(err, Error::Partition(PartitionError::InvalidKey(_))));
    }

    #[test]
    fn test_partition_on_unpartitioned_dataset() {
        let ds = Dataset::new(
            "flat",
            "/flat",
            DatasetDescriptor::unpartitioned(),
            Arc::new(MemoryFileSystem::new()),
        );
        assert!(!ds.is_partitioned());
        assert!(ds.partition(&StorageKey::empty(), true).is_err());
    }
}
