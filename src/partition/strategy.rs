//! Partition strategies and storage keys.
//!
//! A strategy is an ordered list of partitioners, one per directory level.
//! The partition values a strategy computes for a record form its
//! [`StorageKey`], which renders to a relative directory path.

use super::{
    Bucket, FieldPartitioner, HashFieldPartitioner, IdentityFieldPartitioner, ListFieldPartitioner,
    PartitionError,
};
use crate::value::{Record, Value, ValueKind};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Ordered tuple of partition values, one per strategy level.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageKey(Vec<Value>);

impl StorageKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The key of an unpartitioned dataset's single pseudo-partition.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, level: usize) -> Option<&Value> {
        self.0.get(level)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn child(&self, value: Value) -> Self {
        let mut values = Vec::with_capacity(self.0.len() + 1);
        values.extend_from_slice(&self.0);
        values.push(value);
        Self(values)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}

impl<V: Into<Value>> FromIterator<V> for StorageKey {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Ordered sequence of field partitioners.
#[derive(Debug, Clone)]
pub struct PartitionStrategy {
    levels: Vec<Arc<dyn FieldPartitioner>>,
}

impl PartitionStrategy {
    pub fn builder() -> PartitionStrategyBuilder {
        PartitionStrategyBuilder::default()
    }

    /// Number of directory levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false for a built strategy.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, depth: usize) -> Option<&dyn FieldPartitioner> {
        self.levels.get(depth).map(|p| &**p as &dyn FieldPartitioner)
    }

    pub fn levels(&self) -> impl Iterator<Item = &dyn FieldPartitioner> {
        self.levels.iter().map(|p| &**p as &dyn FieldPartitioner)
    }

    /// True if some level reads `field`.
    pub fn reads(&self, field: &str) -> bool {
        self.levels.iter().any(|p| p.source_name() == field)
    }

    /// Computes the storage key for a record.
    ///
    /// # Errors
    /// `MissingField` if a level's source field is absent, or the level's
    /// `InvalidValue` if its partitioner rejects the value. No partial key is
    /// ever returned.
    pub fn key_for(&self, record: &Record) -> Result<StorageKey, PartitionError> {
        let mut values = Vec::with_capacity(self.levels.len());
        for partitioner in &self.levels {
            let value = record.get(partitioner.source_name()).ok_or_else(|| {
                PartitionError::MissingField {
                    partitioner: partitioner.name().to_string(),
                    field: partitioner.source_name().to_string(),
                }
            })?;
            values.push(partitioner.apply(value)?);
        }
        Ok(StorageKey(values))
    }

    /// Renders a key as a path relative to the dataset root.
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.levels
            .iter()
            .zip(key.values())
            .map(|(partitioner, value)| partitioner.segment(value))
            .collect()
    }

    /// Checks that a key has one valid partition value per level.
    pub fn validate_key(&self, key: &StorageKey) -> Result<(), PartitionError> {
        if key.len() != self.levels.len() {
            return Err(PartitionError::InvalidKey(format!(
                "key {} has {} values, strategy has {} levels",
                key,
                key.len(),
                self.levels.len()
            )));
        }
        for (partitioner, value) in self.levels.iter().zip(key.values()) {
            let segment = partitioner.segment(value);
            if partitioner.parse_segment(&segment).as_ref() != Some(value) {
                return Err(PartitionError::InvalidKey(format!(
                    "{} is not a partition value of {}",
                    value,
                    partitioner.name()
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`PartitionStrategy`].
#[derive(Debug, Default)]
pub struct PartitionStrategyBuilder {
    levels: Vec<Arc<dyn FieldPartitioner>>,
    error: Option<PartitionError>,
}

impl PartitionStrategyBuilder {
    /// Appends any partitioner as the next level.
    pub fn add(mut self, partitioner: impl FieldPartitioner + 'static) -> Self {
        self.levels.push(Arc::new(partitioner));
        self
    }

    /// Appends a list partitioner reading the field of the same name.
    pub fn list(self, name: impl Into<String>, buckets: Vec<Bucket>) -> Self {
        self.add(ListFieldPartitioner::new(name, buckets))
    }

    /// Appends an identity partitioner reading the field of the same name.
    pub fn identity(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.add(IdentityFieldPartitioner::new(name, kind))
    }

    /// Appends a hash partitioner; an invalid bucket count surfaces from `build`.
    pub fn hash(
        mut self,
        source: impl Into<String>,
        name: impl Into<String>,
        buckets: u32,
    ) -> Self {
        match HashFieldPartitioner::new(source, name, buckets) {
            Ok(partitioner) => self.add(partitioner),
            Err(err) => {
                self.error.get_or_insert(err);
                self
            }
        }
    }

    /// Validates and builds the strategy.
    ///
    /// # Errors
    /// `EmptyStrategy` without levels, `DuplicateName` when two levels share
    /// a name, or the first error recorded by a convenience method.
    pub fn build(self) -> Result<PartitionStrategy, PartitionError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.levels.is_empty() {
            return Err(PartitionError::EmptyStrategy);
        }
        let mut names = HashSet::new();
        for partitioner in &self.levels {
            if !names.insert(partitioner.name()) {
                return Err(PartitionError::DuplicateName(partitioner.name().to_string()));
            }
        }
        Ok(PartitionStrategy {
            levels: self.levels,
        })
    }
}
