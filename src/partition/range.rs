//! Integer range partitioning.
//!
//! Buckets are declared by ascending inclusive upper bounds. Bucket `i`
//! covers `(bounds[i-1], bounds[i]]`, the first bucket starting at `i64::MIN`.
//! Values above the last bound are outside the declared domain.

use super::{
    in_or_unconstrained, invalid_definition, invalid_value, parse_index, Cardinality,
    FieldPartitioner, PartitionError,
};
use crate::predicate::{Predicate, Range};
use crate::value::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntRangeFieldPartitioner {
    name: String,
    source: String,
    upper_bounds: Vec<i64>,
}

impl IntRangeFieldPartitioner {
    /// Creates a range partitioner.
    ///
    /// # Arguments
    /// * `source` - Record field holding an integer
    /// * `name` - Partition name
    /// * `upper_bounds` - Strictly ascending, non-empty list of inclusive upper bounds
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        upper_bounds: Vec<i64>,
    ) -> Result<Self, PartitionError> {
        let name = name.into();
        if upper_bounds.is_empty() {
            return Err(invalid_definition(&name, "at least one upper bound is required"));
        }
        if upper_bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid_definition(&name, "upper bounds must be strictly ascending"));
        }
        Ok(Self {
            name,
            source: source.into(),
            upper_bounds,
        })
    }

    /// Inclusive `(low, high)` covered by bucket `index`.
    fn bounds(&self, index: usize) -> (i64, i64) {
        let low = if index == 0 {
            i64::MIN
        } else {
            self.upper_bounds[index - 1] + 1
        };
        (low, self.upper_bounds[index])
    }

    fn bucket_indices(&self) -> impl Iterator<Item = (usize, i64, i64)> + '_ {
        (0..self.upper_bounds.len()).map(|i| {
            let (low, high) = self.bounds(i);
            (i, low, high)
        })
    }

    /// True when every integer of `[low, high]` is in `values`.
    fn covers(values: &BTreeSet<Value>, low: i64, high: i64) -> bool {
        let width = high as i128 - low as i128 + 1;
        if width > values.len() as i128 {
            return false;
        }
        (low..=high).all(|v| values.contains(&Value::Int(v)))
    }
}

impl FieldPartitioner for IntRangeFieldPartitioner {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_name(&self) -> &str {
        &self.source
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::Finite(self.upper_bounds.len())
    }

    fn apply(&self, value: &Value) -> Result<Value, PartitionError> {
        let v = value.as_int().ok_or_else(|| invalid_value(&self.name, value))?;
        self.upper_bounds
            .iter()
            .position(|bound| v <= *bound)
            .map(|index| Value::Int(index as i64))
            .ok_or_else(|| invalid_value(&self.name, value))
    }

    fn project(&self, predicate: &Predicate) -> Option<Predicate> {
        match predicate {
            Predicate::Exists => Some(Predicate::Exists),
            Predicate::In(values) => {
                in_or_unconstrained(values.iter().filter_map(|v| self.apply(v).ok()).collect())
            }
            Predicate::Range(range) => {
                let possible = self
                    .bucket_indices()
                    .filter(|(_, low, high)| {
                        !range.intersect(&Range::closed(*low, *high)).is_empty()
                    })
                    .map(|(i, _, _)| Value::Int(i as i64))
                    .collect();
                in_or_unconstrained(possible)
            }
        }
    }

    fn project_strict(&self, predicate: &Predicate) -> Option<Predicate> {
        match predicate {
            Predicate::Exists => Some(Predicate::Exists),
            Predicate::In(values) => {
                let covered = self
                    .bucket_indices()
                    .filter(|(_, low, high)| Self::covers(values, *low, *high))
                    .map(|(i, _, _)| Value::Int(i as i64))
                    .collect();
                in_or_unconstrained(covered)
            }
            Predicate::Range(range) => {
                // buckets are contiguous, so containing both ends means containing all
                let covered = self
                    .bucket_indices()
                    .filter(|(_, low, high)| {
                        range.contains(&Value::Int(*low)) && range.contains(&Value::Int(*high))
                    })
                    .map(|(i, _, _)| Value::Int(i as i64))
                    .collect();
                in_or_unconstrained(covered)
            }
        }
    }

    fn parse_segment(&self, segment: &str) -> Option<Value> {
        parse_index(segment, self.upper_bounds.len())
    }
}
