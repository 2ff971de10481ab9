//! List-based partitioning.
//!
//! Each bucket is a declared set of source values; the partition value is the
//! zero-based index of the first bucket containing the input. Buckets are
//! expected to be disjoint but overlap is not checked.

use super::{
    in_or_unconstrained, invalid_value, parse_index, Cardinality, FieldPartitioner,
    PartitionError,
};
use crate::predicate::Predicate;
use crate::value::Value;
use std::collections::BTreeSet;

/// A set of source values mapped to one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bucket {
    /// An explicit, finite set of values.
    Finite(BTreeSet<Value>),
    /// Every value except the excluded ones. Its members cannot be enumerated.
    Unbounded { excluded: BTreeSet<Value> },
}

impl Bucket {
    /// A finite bucket holding exactly `values`.
    pub fn of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Bucket::Finite(values.into_iter().map(Into::into).collect())
    }

    /// An unbounded bucket holding every value.
    ///
    /// Placed last, it catches whatever earlier buckets did not claim.
    pub fn everything_else() -> Self {
        Bucket::Unbounded {
            excluded: BTreeSet::new(),
        }
    }

    /// An unbounded bucket holding every value but `values`.
    pub fn all_except<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Bucket::Unbounded {
            excluded: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Bucket::Finite(items) => items.contains(value),
            Bucket::Unbounded { excluded } => !excluded.contains(value),
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Bucket::Finite(_))
    }
}

/// Partitioner over an ordered list of buckets.
#[derive(Debug, Clone)]
pub struct ListFieldPartitioner {
    name: String,
    source: String,
    buckets: Vec<Bucket>,
}

impl ListFieldPartitioner {
    /// Creates a list partitioner whose partition name equals its source field.
    pub fn new(name: impl Into<String>, buckets: Vec<Bucket>) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            name,
            buckets,
        }
    }

    /// Creates a list partitioner reading `source` under a different partition name.
    pub fn with_source(
        source: impl Into<String>,
        name: impl Into<String>,
        buckets: Vec<Bucket>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            buckets,
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }
}

impl PartialEq for ListFieldPartitioner {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.buckets == other.buckets
    }
}

impl Eq for ListFieldPartitioner {}

impl FieldPartitioner for ListFieldPartitioner {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_name(&self) -> &str {
        &self.source
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::Finite(self.buckets.len())
    }

    fn apply(&self, value: &Value) -> Result<Value, PartitionError> {
        self.buckets
            .iter()
            .position(|bucket| bucket.contains(value))
            .map(|index| Value::Int(index as i64))
            .ok_or_else(|| invalid_value(&self.name, value))
    }

    fn project(&self, predicate: &Predicate) -> Option<Predicate> {
        match predicate {
            Predicate::Exists => Some(Predicate::Exists),
            // values outside every bucket cannot be stored, so they select nothing
            Predicate::In(values) => {
                in_or_unconstrained(values.iter().filter_map(|v| self.apply(v).ok()).collect())
            }
            Predicate::Range(range) => {
                let mut possible = BTreeSet::new();
                for (index, bucket) in self.buckets.iter().enumerate() {
                    let overlaps = match bucket {
                        // an unbounded bucket can never be shown to miss the range
                        Bucket::Unbounded { .. } => true,
                        Bucket::Finite(items) => items.iter().any(|item| range.contains(item)),
                    };
                    if overlaps {
                        possible.insert(Value::Int(index as i64));
                    }
                }
                in_or_unconstrained(possible)
            }
        }
    }

    fn project_strict(&self, predicate: &Predicate) -> Option<Predicate> {
        match predicate {
            Predicate::Exists => Some(Predicate::Exists),
            Predicate::In(_) | Predicate::Range(_) => {
                let mut covered = BTreeSet::new();
                for (index, bucket) in self.buckets.iter().enumerate() {
                    let Bucket::Finite(items) = bucket else {
                        continue;
                    };
                    // an empty bucket holds no records and is never selected by `project`
                    if !items.is_empty() && items.iter().all(|item| predicate.matches(item)) {
                        covered.insert(Value::Int(index as i64));
                    }
                }
                in_or_unconstrained(covered)
            }
        }
    }

    fn parse_segment(&self, segment: &str) -> Option<Value> {
        parse_index(segment, self.buckets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Range;
    use proptest::prelude::*;

    fn letters() -> ListFieldPartitioner {
        ListFieldPartitioner::new("kind", vec![Bucket::of(["a", "b"]), Bucket::of(["c"])])
    }

    fn with_catch_all() -> ListFieldPartitioner {
        ListFieldPartitioner::new(
            "kind",
            vec![Bucket::of(["a", "b"]), Bucket::of(["c"]), Bucket::everything_else()],
        )
    }

    #[test]
    fn test_apply_first_matching_bucket() {
        let p = letters();
        assert_eq!(p.apply(&Value::from("a")).unwrap(), Value::Int(0));
        assert_eq!(p.apply(&Value::from("b")).unwrap(), Value::Int(0));
        assert_eq!(p.apply(&Value::from("c")).unwrap(), Value::Int(1));
        assert_eq!(p.cardinality(), Cardinality::Finite(2));
    }

    #[test]
    fn test_apply_rejects_undeclared_value() {
        let err = letters().apply(&Value::from("z")).unwrap_err();
        assert_eq!(
            err,
            PartitionError::InvalidValue {
                partitioner: "kind".to_string(),
                value: Value::from("z"),
            }
        );
    }

    #[test]
    fn test_overlapping_buckets_use_first_match() {
        let p = ListFieldPartitioner::new("kind", vec![Bucket::of(["a"]), Bucket::of(["a", "b"])]);
        assert_eq!(p.apply(&Value::from("a")).unwrap(), Value::Int(0));
        assert_eq!(p.apply(&Value::from("b")).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_exists_projects_to_exists() {
        let p = letters();
        assert_eq!(p.project(&Predicate::Exists), Some(Predicate::Exists));
        assert_eq!(p.project_strict(&Predicate::Exists), Some(Predicate::Exists));
    }

    #[test]
    fn test_project_in_maps_each_value() {
        let p = letters();
        assert_eq!(
            p.project(&Predicate::in_values(["a", "c"])),
            Some(Predicate::in_values([0, 1]))
        );
        // undeclared values drop out of the projected set
        assert_eq!(
            p.project(&Predicate::in_values(["a", "z"])),
            Some(Predicate::in_values([0]))
        );
    }

    #[test]
    fn test_project_in_without_match_is_unconstrained() {
        let p = letters();
        assert_eq!(p.project(&Predicate::eq("z")), None);
        assert_eq!(p.project(&Predicate::In(BTreeSet::new())), None);
    }

    #[test]
    fn test_project_range() {
        let p = letters();
        let a_to_a = Predicate::Range(Range::closed("a", "a"));
        assert_eq!(p.project(&a_to_a), Some(Predicate::in_values([0])));
        assert_eq!(p.project_strict(&a_to_a), None);

        let a_to_c = Predicate::Range(Range::closed("a", "c"));
        assert_eq!(p.project(&a_to_c), Some(Predicate::in_values([0, 1])));
        assert_eq!(p.project_strict(&a_to_c), Some(Predicate::in_values([0, 1])));

        let b_up = Predicate::Range(Range::at_least("b"));
        assert_eq!(p.project_strict(&b_up), Some(Predicate::in_values([1])));
    }

    #[test]
    fn test_project_range_without_match_is_unconstrained() {
        let p = letters();
        let x_to_z = Predicate::Range(Range::closed("x", "z"));
        assert_eq!(p.project(&x_to_z), None);
    }

    #[test]
    fn test_unbounded_bucket_in_range_projection() {
        let p = with_catch_all();
        let x_to_z = Predicate::Range(Range::closed("x", "z"));
        assert_eq!(p.project(&x_to_z), Some(Predicate::in_values([2])));
        assert_eq!(
            p.project_strict(&Predicate::Range(Range::all())),
            Some(Predicate::in_values([0, 1]))
        );
        assert_eq!(p.apply(&Value::from("q")).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_all_except_bucket() {
        let p = ListFieldPartitioner::new(
            "region",
            vec![Bucket::of(["eu"]), Bucket::all_except(["eu", "banned"])],
        );
        assert_eq!(p.apply(&Value::from("us")).unwrap(), Value::Int(1));
        assert!(p.apply(&Value::from("banned")).is_err());
    }

    #[test]
    fn test_project_strict_in() {
        let p = letters();
        assert_eq!(
            p.project_strict(&Predicate::in_values(["a", "b"])),
            Some(Predicate::in_values([0]))
        );
        assert_eq!(p.project_strict(&Predicate::eq("a")), None);
    }

    #[test]
    fn test_empty_bucket_never_strictly_selected() {
        let empty = Bucket::of(Vec::<&str>::new());
        let p = ListFieldPartitioner::new("kind", vec![empty, Bucket::of(["c"])]);
        assert_eq!(p.project(&Predicate::eq("c")), Some(Predicate::in_values([1])));
        assert_eq!(p.project_strict(&Predicate::eq("c")), Some(Predicate::in_values([1])));
    }

    #[test]
    fn test_equality_by_name_and_buckets() {
        assert_eq!(letters(), letters());
        let renamed = ListFieldPartitioner::new("other", letters().buckets().to_vec());
        assert_ne!(letters(), renamed);
    }

    #[test]
    fn test_segments() {
        let p = letters();
        assert_eq!(p.segment(&Value::Int(1)), "1");
        assert_eq!(p.parse_segment("1"), Some(Value::Int(1)));
        assert_eq!(p.parse_segment("2"), None);
        assert_eq!(p.parse_segment("a"), None);
    }

    fn accepted(projection: &Option<Predicate>, count: usize) -> BTreeSet<i64> {
        (0..count as i64)
            .filter(|i| projection.as_ref().map_or(true, |p| p.matches(&Value::Int(*i))))
            .collect()
    }

    fn arb_letter() -> impl Strategy<Value = Value> {
        "[a-f]".prop_map(Value::Str)
    }

    fn arb_predicate() -> impl Strategy<Value = Predicate> {
        prop_oneof![
            Just(Predicate::Exists),
            prop::collection::btree_set(arb_letter(), 0..4).prop_map(Predicate::In),
            (arb_letter(), arb_letter()).prop_map(|(a, b)| Predicate::Range(Range::closed(a, b))),
            arb_letter().prop_map(|a| Predicate::Range(Range::greater_than(a))),
        ]
    }

    /// Disjoint finite buckets, optionally followed by a catch-all.
    fn arb_buckets() -> impl Strategy<Value = Vec<Bucket>> {
        (1usize..5, prop::collection::vec(0usize..6, 6), any::<bool>()).prop_map(
            |(count, owners, catch_all)| {
                let mut sets = vec![BTreeSet::new(); count];
                for (letter, owner) in ["a", "b", "c", "d", "e", "f"].iter().zip(owners) {
                    if owner < count {
                        sets[owner].insert(Value::from(*letter));
                    }
                }
                let mut buckets: Vec<Bucket> = sets.into_iter().map(Bucket::Finite).collect();
                if catch_all {
                    buckets.push(Bucket::everything_else());
                }
                buckets
            },
        )
    }

    proptest! {
        #[test]
        fn prop_apply_returns_first_containing_bucket(buckets in arb_buckets(), v in arb_letter()) {
            let p = ListFieldPartitioner::new("f", buckets.clone());
            match buckets.iter().position(|b| b.contains(&v)) {
                Some(i) => prop_assert_eq!(p.apply(&v).unwrap(), Value::Int(i as i64)),
                None => prop_assert!(p.apply(&v).is_err()),
            }
        }

        #[test]
        fn prop_strict_is_subset_of_project(buckets in arb_buckets(), pred in arb_predicate()) {
            let p = ListFieldPartitioner::new("f", buckets.clone());
            let loose = accepted(&p.project(&pred), buckets.len());
            let strict = accepted(&p.project_strict(&pred), buckets.len());
            // "no constraint" from strict means nothing is provably covered
            if p.project_strict(&pred).is_some() {
                prop_assert!(strict.is_subset(&loose));
            }
        }

        #[test]
        fn prop_unbounded_bucket_in_range_projections(
            buckets in arb_buckets(),
            a in arb_letter(),
            b in arb_letter(),
        ) {
            let p = ListFieldPartitioner::new("f", buckets.clone());
            let pred = Predicate::Range(Range::closed(a, b));
            let loose = accepted(&p.project(&pred), buckets.len());
            let strict = p.project_strict(&pred);
            for (i, bucket) in buckets.iter().enumerate() {
                if !bucket.is_finite() {
                    prop_assert!(loose.contains(&(i as i64)));
                    if let Some(strict) = &strict {
                        prop_assert!(!strict.matches(&Value::Int(i as i64)));
                    }
                }
            }
        }
    }
}
