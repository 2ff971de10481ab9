//! Identity partitioning: the partition value is the source value itself.

use super::{in_or_unconstrained, invalid_value, Cardinality, FieldPartitioner, PartitionError};
use crate::predicate::Predicate;
use crate::value::{Value, ValueKind};

/// Partitions by the raw field value. Each partition holds exactly one
/// source value, so both projections are exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFieldPartitioner {
    name: String,
    source: String,
    kind: ValueKind,
}

impl IdentityFieldPartitioner {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            name,
            kind,
        }
    }

    pub fn with_source(
        source: impl Into<String>,
        name: impl Into<String>,
        kind: ValueKind,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            kind,
        }
    }

    /// Strings must be usable as a single, visible directory name.
    fn representable(&self, value: &Value) -> bool {
        if value.kind() != self.kind {
            return false;
        }
        match value {
            Value::Str(s) => {
                !s.is_empty()
                    && !s.starts_with('.')
                    && !s.starts_with('_')
                    && !s.contains(|c: char| c == '/' || c == '\\')
            }
            _ => true,
        }
    }

    fn project_exact(&self, predicate: &Predicate) -> Predicate {
        match predicate {
            Predicate::Exists => Predicate::Exists,
            Predicate::In(values) => Predicate::In(
                values
                    .iter()
                    .filter(|v| self.representable(v))
                    .cloned()
                    .collect(),
            ),
            Predicate::Range(range) => Predicate::Range(range.clone()),
        }
    }
}

impl FieldPartitioner for IdentityFieldPartitioner {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_name(&self) -> &str {
        &self.source
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::Unbounded
    }

    fn apply(&self, value: &Value) -> Result<Value, PartitionError> {
        if self.representable(value) {
            Ok(value.clone())
        } else {
            Err(invalid_value(&self.name, value))
        }
    }

    fn project(&self, predicate: &Predicate) -> Option<Predicate> {
        match self.project_exact(predicate) {
            Predicate::In(values) => in_or_unconstrained(values),
            exact => Some(exact),
        }
    }

    fn project_strict(&self, predicate: &Predicate) -> Option<Predicate> {
        Some(self.project_exact(predicate))
    }

    fn parse_segment(&self, segment: &str) -> Option<Value> {
        let value = Value::parse(self.kind, segment)?;
        (self.representable(&value) && value.to_string() == segment).then_some(value)
    }
}
