//! Constrained views over a dataset.
//!
//! A [`View`] pairs a dataset with [`Constraints`]. Views are immutable
//! values: filtering returns a new view whose constraints are the
//! intersection of the old ones and the filter. Partition pruning, reading,
//! writing and deletion all derive from those constraints.

use crate::constraints::Constraints;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::predicate::Predicate;
use crate::storage::FileSystem;
use crate::value::Record;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod iterator;
pub mod reader;
pub mod writer;

pub use iterator::{PartitionIterator, PathIterator};
pub use reader::DatasetReader;
pub use writer::{DatasetWriter, FileWriter, PartitionedWriter};

/// A dataset restricted by per-field constraints.
#[derive(Debug, Clone)]
pub struct View {
    dataset: Dataset,
    constraints: Constraints,
}

impl View {
    pub(crate) fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            constraints: Constraints::new(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Narrows the view. Chaining filters is equivalent to filtering once
    /// by their intersection.
    pub fn filter(&self, constraints: &Constraints) -> View {
        Self {
            dataset: self.dataset.clone(),
            constraints: self.constraints.intersect(constraints),
        }
    }

    /// Narrows the view by a single field predicate.
    pub fn with(&self, field: impl Into<String>, predicate: Predicate) -> View {
        Self {
            dataset: self.dataset.clone(),
            constraints: self.constraints.clone().with(field, predicate),
        }
    }

    /// True if the record satisfies every constraint of this view.
    pub fn includes(&self, record: &Record) -> bool {
        self.constraints.matches(record)
    }

    /// Partitions that may hold records of this view.
    pub fn partitions(&self) -> PartitionIterator {
        self.partition_iterator()
    }

    /// Data files of the partitions this view selects.
    pub fn path_iterator(&self) -> PathIterator {
        PathIterator::new(Arc::clone(self.dataset.file_system()), self.partitions())
    }

    pub fn new_reader(&self) -> DatasetReader {
        DatasetReader::new(
            Arc::clone(self.dataset.file_system()),
            self.path_iterator(),
            self.constraints.clone(),
        )
    }

    /// A writer that only accepts records this view includes.
    pub fn new_writer(&self) -> Box<dyn DatasetWriter> {
        let fs = Arc::clone(self.dataset.file_system());
        let config = self.dataset.config().clone();
        match self.dataset.descriptor().partition_strategy() {
            Some(strategy) => Box::new(PartitionedWriter::new(
                fs,
                self.dataset.root(),
                strategy.clone(),
                self.constraints.clone(),
                config,
            )),
            None => Box::new(FileWriter::new(
                fs,
                self.dataset.root(),
                config.data_file_extension,
                self.constraints.clone(),
            )),
        }
    }

    /// Deletes every partition this view fully covers, then removes
    /// partition directories left empty up to, but not including, the
    /// dataset root.
    ///
    /// A partition is covered when its key alone proves every record
    /// matches. Other selected partitions are read and deleted only if each
    /// record they hold matches; a partition holding any excluded record is
    /// left untouched, and so is one holding no records.
    ///
    /// # Returns
    /// `true` if anything was deleted
    ///
    /// # Errors
    /// `UnsupportedDelete` without touching storage if a constraint names a
    /// field no partition level reads, or if an unpartitioned dataset is
    /// constrained at all.
    pub fn delete_all(&self) -> Result<bool> {
        let fs = self.dataset.file_system();
        let root = self.dataset.root();

        let Some(strategy) = self.dataset.descriptor().partition_strategy() else {
            if !self.constraints.is_empty() {
                return Err(Error::UnsupportedDelete(format!(
                    "dataset {} is not partitioned but the view is constrained by {}",
                    self.dataset.name(),
                    self.constraints
                )));
            }
            let mut deleted = false;
            for path in self.path_iterator() {
                let path = path?;
                deleted |= fs.delete(&path, false).map_err(|e| Error::io(&path, e))?;
            }
            info!(dataset = self.dataset.name(), deleted, "Deleted data files");
            return Ok(deleted);
        };

        if let Some(field) = self.constraints.fields().find(|f| !strategy.reads(f)) {
            return Err(Error::UnsupportedDelete(format!(
                "field {} is not read by any partition level",
                field
            )));
        }

        let mut deleted = false;
        for partition in self.partitions() {
            let (key, path) = partition?;
            if !self.constraints.covers(strategy, &key) && !self.holds_only_matching(&path)? {
                debug!(partition = %key, "Keeping partition with records outside the view");
                continue;
            }
            debug!(partition = %key, "Deleting partition");
            deleted = delete_cleanly(&**fs, root, &path)? || deleted;
        }
        info!(
            dataset = self.dataset.name(),
            constraints = %self.constraints,
            deleted,
            "Deleted view"
        );
        Ok(deleted)
    }

    fn partition_iterator(&self) -> PartitionIterator {
        PartitionIterator::new(
            Arc::clone(self.dataset.file_system()),
            self.dataset.root().to_path_buf(),
            self.dataset.descriptor().partition_strategy(),
            &self.constraints,
        )
    }

    /// True if `dir` directly holds at least one record and every record it
    /// holds matches this view.
    fn holds_only_matching(&self, dir: &Path) -> Result<bool> {
        let fs = Arc::clone(self.dataset.file_system());
        let partition = PartitionIterator::single(fs.clone(), PathBuf::from(dir));
        let paths = PathIterator::new(fs.clone(), partition);
        let mut any = false;
        for record in DatasetReader::new(fs, paths, Constraints::new()) {
            if !self.constraints.matches(&record?) {
                return Ok(false);
            }
            any = true;
        }
        Ok(any)
    }
}

/// Deletes `dir`, then every ancestor strictly below `root` that is left
/// empty.
fn delete_cleanly(fs: &dyn FileSystem, root: &Path, dir: &Path) -> Result<bool> {
    let mut deleted = fs.delete(dir, true).map_err(|e| Error::io(dir, e))?;

    let mut current = dir.parent();
    while let Some(ancestor) = current {
        if ancestor == root || !ancestor.starts_with(root) {
            break;
        }
        let entries = fs.list(ancestor).map_err(|e| {
            warn!(
                path = %ancestor.display(),
                error = %e,
                "Stopping cleanup, cannot list ancestor"
            );
            Error::enumeration(ancestor, e)
        })?;
        if !entries.is_empty() {
            break;
        }
        let removed = fs.delete(ancestor, false).map_err(|e| {
            warn!(
                path = %ancestor.display(),
                error = %e,
                "Stopping cleanup, cannot remove ancestor"
            );
            Error::io(ancestor, e)
        })?;
        deleted = removed || deleted;
        current = ancestor.parent();
    }
    Ok(deleted)
}
