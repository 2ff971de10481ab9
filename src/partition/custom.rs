//! Partitioners assembled from caller-supplied functions.

use super::{invalid_value, Cardinality, FieldPartitioner, PartitionError};
use crate::predicate::Predicate;
use crate::value::{Value, ValueKind};
use std::fmt;
use std::sync::Arc;

/// Maps a source value to a partition value; `None` rejects the value.
pub type ApplyFn = dyn Fn(&Value) -> Option<Value> + Send + Sync;

/// Projects a source predicate onto partition values.
pub type ProjectFn = dyn Fn(&Predicate) -> Option<Predicate> + Send + Sync;

/// A partitioner defined by an apply/project function pair.
///
/// Without an explicit strict projection only `Exists` is projected strictly,
/// which never selects a partition on an unproven basis.
#[derive(Clone)]
pub struct FnFieldPartitioner {
    name: String,
    source: String,
    kind: ValueKind,
    cardinality: Cardinality,
    apply: Arc<ApplyFn>,
    project: Arc<ProjectFn>,
    project_strict: Option<Arc<ProjectFn>>,
}

impl FnFieldPartitioner {
    /// Creates a function-backed partitioner.
    ///
    /// # Arguments
    /// * `source` - Record field read by `apply`
    /// * `name` - Partition name
    /// * `kind` - Kind of the partition values `apply` produces
    /// * `apply` - Source value to partition value
    /// * `project` - Over-approximating predicate projection
    pub fn new<A, P>(
        source: impl Into<String>,
        name: impl Into<String>,
        kind: ValueKind,
        apply: A,
        project: P,
    ) -> Self
    where
        A: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
        P: Fn(&Predicate) -> Option<Predicate> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source: source.into(),
            kind,
            cardinality: Cardinality::Unbounded,
            apply: Arc::new(apply),
            project: Arc::new(project),
            project_strict: None,
        }
    }

    /// Supplies an under-approximating projection.
    pub fn with_strict<P>(mut self, project_strict: P) -> Self
    where
        P: Fn(&Predicate) -> Option<Predicate> + Send + Sync + 'static,
    {
        self.project_strict = Some(Arc::new(project_strict));
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }
}

impl fmt::Debug for FnFieldPartitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFieldPartitioner")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("kind", &self.kind)
            .field("cardinality", &self.cardinality)
            .finish_non_exhaustive()
    }
}

impl FieldPartitioner for FnFieldPartitioner {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_name(&self) -> &str {
        &self.source
    }

    fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    fn apply(&self, value: &Value) -> Result<Value, PartitionError> {
        match (self.apply)(value) {
            Some(partition) if partition.kind() == self.kind => Ok(partition),
            _ => Err(invalid_value(&self.name, value)),
        }
    }

    fn project(&self, predicate: &Predicate) -> Option<Predicate> {
        (self.project)(predicate)
    }

    fn project_strict(&self, predicate: &Predicate) -> Option<Predicate> {
        match &self.project_strict {
            Some(project_strict) => project_strict(predicate),
            None => match predicate {
                Predicate::Exists => Some(Predicate::Exists),
                Predicate::In(_) | Predicate::Range(_) => None,
            },
        }
    }

    fn parse_segment(&self, segment: &str) -> Option<Value> {
        Value::parse(self.kind, segment).filter(|v| v.to_string() == segment)
    }
}
