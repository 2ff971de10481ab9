//! Field partitioners and partition strategies.
//!
//! A [`FieldPartitioner`] maps one source field's value to a partition value
//! and translates predicates on the source field into predicates on partition
//! values. A [`PartitionStrategy`] stacks partitioners into directory levels.
//!
//! Two projections exist for every partitioner:
//! - `project` over-approximates: it accepts every partition that may hold a
//!   matching value. `None` means "cannot prune".
//! - `project_strict` under-approximates: it accepts only partitions whose
//!   every possible value matches. `None` means "no partition is provably
//!   covered".

use crate::predicate::Predicate;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub mod custom;
pub mod hash;
pub mod identity;
pub mod list;
pub mod range;
pub mod strategy;

pub use custom::FnFieldPartitioner;
pub use hash::HashFieldPartitioner;
pub use identity::IdentityFieldPartitioner;
pub use list::{Bucket, ListFieldPartitioner};
pub use range::IntRangeFieldPartitioner;
pub use strategy::{PartitionStrategy, PartitionStrategyBuilder, StorageKey};

/// Errors specific to the partition layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// The value is outside every bucket the partitioner declares
    #[error("Value {value} is not in any bucket of partitioner {partitioner}")]
    InvalidValue { partitioner: String, value: Value },

    /// The record lacks the field a partitioner reads
    #[error("Record has no field {field} required by partitioner {partitioner}")]
    MissingField { partitioner: String, field: String },

    /// Two partitioners in one strategy share a name
    #[error("Duplicate partitioner name: {0}")]
    DuplicateName(String),

    /// A strategy needs at least one partitioner
    #[error("Partition strategy has no partitioners")]
    EmptyStrategy,

    /// A storage key does not fit the strategy
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// A partitioner was declared with unusable parameters
    #[error("Invalid partitioner {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },
}

/// Number of distinct partition values a partitioner can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Finite(usize),
    Unbounded,
}

/// Maps a source field value to a partition value and projects predicates.
///
/// Implementations must keep `project_strict(p)` a subset of `project(p)`
/// for every predicate `p`.
pub trait FieldPartitioner: fmt::Debug + Send + Sync {
    /// Partition name; unique within a strategy.
    fn name(&self) -> &str;

    /// Name of the record field this partitioner reads.
    fn source_name(&self) -> &str;

    fn cardinality(&self) -> Cardinality;

    /// Computes the partition value for `value`.
    ///
    /// # Errors
    /// `PartitionError::InvalidValue` when `value` is outside the declared domain.
    fn apply(&self, value: &Value) -> Result<Value, PartitionError>;

    /// Orders partition values.
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        a.cmp(b)
    }

    /// Over-approximating projection used for read pruning.
    fn project(&self, predicate: &Predicate) -> Option<Predicate>;

    /// Under-approximating projection used where only fully covered
    /// partitions may be selected.
    fn project_strict(&self, predicate: &Predicate) -> Option<Predicate>;

    /// Directory name for a partition value.
    fn segment(&self, value: &Value) -> String {
        value.to_string()
    }

    /// Parses a directory name back into a partition value.
    ///
    /// Returns `None` for names that are not a valid partition value of this
    /// partitioner, which callers treat as unrelated entries.
    fn parse_segment(&self, segment: &str) -> Option<Value>;
}

pub(crate) fn invalid_value(partitioner: &str, value: &Value) -> PartitionError {
    PartitionError::InvalidValue {
        partitioner: partitioner.to_string(),
        value: value.clone(),
    }
}

pub(crate) fn invalid_definition(name: &str, reason: impl Into<String>) -> PartitionError {
    PartitionError::InvalidDefinition {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// `In(values)`, or no constraint when nothing matched.
///
/// An empty match set is deliberately widened to "no constraint" rather than
/// "match nothing"; callers cannot tell the two apart.
pub(crate) fn in_or_unconstrained(values: BTreeSet<Value>) -> Option<Predicate> {
    if values.is_empty() {
        None
    } else {
        Some(Predicate::In(values))
    }
}

/// Parses a bucket index written in canonical decimal form.
pub(crate) fn parse_index(segment: &str, count: usize) -> Option<Value> {
    let index: usize = segment.parse().ok()?;
    if index >= count || index.to_string() != segment {
        return None;
    }
    Some(Value::Int(index as i64))
}
