//! Hash partitioning.
//!
//! Values are spread across a fixed number of buckets using a deterministic
//! hash, so placement is stable across runs and processes.

use super::{
    in_or_unconstrained, invalid_definition, parse_index, Cardinality, FieldPartitioner,
    PartitionError,
};
use crate::predicate::Predicate;
use crate::value::Value;
use xxhash_rust::xxh3::xxh3_64;

/// Selects the bucket for a value.
///
/// # Arguments
/// * `value` - The source value
/// * `bucket_count` - Total number of buckets (non-zero)
///
/// # Returns
/// Bucket index in range [0, bucket_count)
pub fn hash_bucket(value: &Value, bucket_count: u32) -> u32 {
    (xxh3_64(&value.canonical_bytes()) % bucket_count as u64) as u32
}

/// Partitions by hash of the source value modulo a bucket count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashFieldPartitioner {
    name: String,
    source: String,
    buckets: u32,
}

impl HashFieldPartitioner {
    /// Creates a hash partitioner.
    ///
    /// # Arguments
    /// * `source` - Record field to hash
    /// * `name` - Partition name
    /// * `buckets` - Number of buckets (must be > 0)
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        buckets: u32,
    ) -> Result<Self, PartitionError> {
        let name = name.into();
        if buckets == 0 {
            return Err(invalid_definition(&name, "bucket count must be greater than 0"));
        }
        Ok(Self {
            name,
            source: source.into(),
            buckets,
        })
    }

    pub fn buckets(&self) -> u32 {
        self.buckets
    }
}

impl FieldPartitioner for HashFieldPartitioner {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_name(&self) -> &str {
        &self.source
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::Finite(self.buckets as usize)
    }

    fn apply(&self, value: &Value) -> Result<Value, PartitionError> {
        Ok(Value::Int(hash_bucket(value, self.buckets) as i64))
    }

    fn project(&self, predicate: &Predicate) -> Option<Predicate> {
        match predicate {
            Predicate::Exists => Some(Predicate::Exists),
            Predicate::In(values) => in_or_unconstrained(
                values
                    .iter()
                    .map(|v| Value::Int(hash_bucket(v, self.buckets) as i64))
                    .collect(),
            ),
            // hashing destroys order
            Predicate::Range(_) => None,
        }
    }

    fn project_strict(&self, predicate: &Predicate) -> Option<Predicate> {
        match predicate {
            Predicate::Exists => Some(Predicate::Exists),
            // every bucket holds unboundedly many source values
            Predicate::In(_) | Predicate::Range(_) => None,
        }
    }

    fn parse_segment(&self, segment: &str) -> Option<Value> {
        parse_index(segment, self.buckets as usize)
    }
}
