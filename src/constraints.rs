//! Conjunctive per-field constraints.
//!
//! Constraints are keyed by record field name and only ever narrow: a view's
//! constraints are the intersection of every filter applied to it.

use crate::partition::{PartitionStrategy, StorageKey};
use crate::predicate::Predicate;
use crate::value::Record;
use std::collections::BTreeMap;
use std::fmt;

/// Which projection to compute per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Every partition that may hold a matching record.
    Read,
    /// Only partitions whose every record provably matches. On a constrained
    /// level, `None` means no partition is proven covered.
    Delete,
}

/// Mapping from field name to predicate, combined conjunctively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    predicates: BTreeMap<String, Predicate>,
}

impl Constraints {
    /// Unconstrained: matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate, intersecting with any existing one on the same field.
    pub fn with(mut self, field: impl Into<String>, predicate: Predicate) -> Self {
        let field = field.into();
        let combined = match self.predicates.get(&field) {
            Some(existing) => existing.intersect(&predicate),
            None => predicate,
        };
        self.predicates.insert(field, combined);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.predicates.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Per-field conjunction. Fields present on one side pass through unchanged.
    pub fn intersect(&self, other: &Constraints) -> Constraints {
        other
            .predicates
            .iter()
            .fold(self.clone(), |acc, (field, predicate)| {
                acc.with(field.clone(), predicate.clone())
            })
    }

    /// True if the record satisfies every predicate. A missing field fails
    /// any predicate on it, `Exists` included.
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|(field, predicate)| {
            record
                .get(field)
                .map_or(false, |value| predicate.matches(value))
        })
    }

    /// True if every constrained field is read by some strategy level.
    pub fn aligned_with(&self, strategy: &PartitionStrategy) -> bool {
        self.fields().all(|field| strategy.reads(field))
    }

    /// One projected predicate per strategy level. In `Read` mode `None`
    /// means the level is unconstrained; see [`ProjectionMode::Delete`] for
    /// the strict reading.
    pub fn project(
        &self,
        strategy: &PartitionStrategy,
        mode: ProjectionMode,
    ) -> Vec<Option<Predicate>> {
        strategy
            .levels()
            .map(|partitioner| {
                let predicate = self.predicates.get(partitioner.source_name())?;
                match mode {
                    ProjectionMode::Read => partitioner.project(predicate),
                    ProjectionMode::Delete => partitioner.project_strict(predicate),
                }
            })
            .collect()
    }

    /// True if every record stored under `key` is guaranteed to match, judged
    /// from the key alone. Each constrained field must be proven by a strict
    /// projection on some level reading it.
    pub fn covers(&self, strategy: &PartitionStrategy, key: &StorageKey) -> bool {
        let strict = self.project(strategy, ProjectionMode::Delete);
        self.fields().all(|field| {
            strategy
                .levels()
                .zip(&strict)
                .zip(key.values())
                .any(|((partitioner, projected), value)| {
                    partitioner.source_name() == field
                        && projected.as_ref().map_or(false, |p| p.matches(value))
                })
        })
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, predicate)) in self.predicates.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", field, predicate)?;
        }
        f.write_str("}")
    }
}
