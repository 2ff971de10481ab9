//! Partition-pruned views over directory-structured datasets.
//!
//! A [`Dataset`] is a directory tree whose layout is described by a
//! [`PartitionStrategy`]: each level maps one record field to a directory
//! name. A [`View`] narrows the dataset with per-field [`Predicate`]s, and
//! those predicates are projected onto every level to prune which
//! directories are listed, read or deleted.

pub mod constraints;
pub mod dataset;
pub mod error;
pub mod partition;
pub mod predicate;
pub mod storage;
pub mod value;
pub mod view;

// Re-export common types for convenience
pub use constraints::{Constraints, ProjectionMode};
pub use dataset::{Dataset, DatasetConfig, DatasetDescriptor, Partition};
pub use error::{Error, Result};
pub use partition::{FieldPartitioner, PartitionStrategy, StorageKey};
pub use predicate::{Predicate, Range};
pub use storage::{FileSystem, LocalFileSystem, MemoryFileSystem};
pub use value::{Record, Value, ValueKind};
pub use view::{DatasetReader, DatasetWriter, View};
