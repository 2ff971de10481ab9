//! Query predicates over a single field.
//!
//! The set of predicate kinds is closed. Every partitioner matches on all of
//! them explicitly, so adding a kind forces each projection to be revisited.

use crate::value::Value;
use std::collections::BTreeSet;
use std::ops::Bound;

/// A predicate over one field's values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The field is present.
    Exists,
    /// The field equals one of the listed values. An empty set matches nothing.
    In(BTreeSet<Value>),
    /// The field lies within the range.
    Range(Range),
}

impl Predicate {
    /// Shorthand for `Predicate::In` from any iterable of values.
    pub fn in_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In(values.into_iter().map(Into::into).collect())
    }

    /// Shorthand for a single-value equality predicate.
    pub fn eq(value: impl Into<Value>) -> Self {
        Predicate::in_values([value])
    }

    /// Tests a present field value.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Predicate::Exists => true,
            Predicate::In(set) => set.contains(value),
            Predicate::Range(range) => range.contains(value),
        }
    }

    /// Conjunction of two predicates on the same field.
    pub fn intersect(&self, other: &Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Exists, p) | (p, Predicate::Exists) => p.clone(),
            (Predicate::In(a), Predicate::In(b)) => {
                Predicate::In(a.intersection(b).cloned().collect())
            }
            (Predicate::In(set), Predicate::Range(range))
            | (Predicate::Range(range), Predicate::In(set)) => {
                Predicate::In(set.iter().filter(|v| range.contains(v)).cloned().collect())
            }
            (Predicate::Range(a), Predicate::Range(b)) => Predicate::Range(a.intersect(b)),
        }
    }
}

impl From<Range> for Predicate {
    fn from(range: Range) -> Self {
        Predicate::Range(range)
    }
}

/// A range of values with optional, independently inclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    lower: Bound<Value>,
    upper: Bound<Value>,
}

impl Range {
    pub fn new(lower: Bound<Value>, upper: Bound<Value>) -> Self {
        Self { lower, upper }
    }

    /// `[lower, upper]`
    pub fn closed(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self::new(Bound::Included(lower.into()), Bound::Included(upper.into()))
    }

    /// `[lower, upper)`
    pub fn closed_open(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self::new(Bound::Included(lower.into()), Bound::Excluded(upper.into()))
    }

    /// `(lower, upper)`
    pub fn open(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self::new(Bound::Excluded(lower.into()), Bound::Excluded(upper.into()))
    }

    /// `[lower, +inf)`
    pub fn at_least(lower: impl Into<Value>) -> Self {
        Self::new(Bound::Included(lower.into()), Bound::Unbounded)
    }

    /// `(lower, +inf)`
    pub fn greater_than(lower: impl Into<Value>) -> Self {
        Self::new(Bound::Excluded(lower.into()), Bound::Unbounded)
    }

    /// `(-inf, upper]`
    pub fn at_most(upper: impl Into<Value>) -> Self {
        Self::new(Bound::Unbounded, Bound::Included(upper.into()))
    }

    /// `(-inf, upper)`
    pub fn less_than(upper: impl Into<Value>) -> Self {
        Self::new(Bound::Unbounded, Bound::Excluded(upper.into()))
    }

    /// `(-inf, +inf)`
    pub fn all() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    pub fn lower(&self) -> Bound<&Value> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Bound<&Value> {
        self.upper.as_ref()
    }

    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.lower {
            Bound::Included(l) => value >= l,
            Bound::Excluded(l) => value > l,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(u) => value <= u,
            Bound::Excluded(u) => value < u,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Returns true if no value can satisfy the range.
    ///
    /// Discrete gaps such as `(1, 2)` over integers are not detected.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
            _ => false,
        }
    }

    /// Tightest range accepted by both `self` and `other`.
    pub fn intersect(&self, other: &Range) -> Range {
        Range {
            lower: tighter(&self.lower, &other.lower, true),
            upper: tighter(&self.upper, &other.upper, false),
        }
    }
}

fn tighter(a: &Bound<Value>, b: &Bound<Value>, lower: bool) -> Bound<Value> {
    let (av, bv) = match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => return other.clone(),
        (Bound::Included(av) | Bound::Excluded(av), Bound::Included(bv) | Bound::Excluded(bv)) => {
            (av, bv)
        }
    };
    if av == bv {
        // exclusive wins on a tie
        return if matches!(a, Bound::Excluded(_)) { a.clone() } else { b.clone() };
    }
    let a_wins = if lower { av > bv } else { av < bv };
    if a_wins {
        a.clone()
    } else {
        b.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_contains_bounds() {
        let range = Range::closed_open(1, 5);
        assert!(range.contains(&Value::Int(1)));
        assert!(range.contains(&Value::Int(4)));
        assert!(!range.contains(&Value::Int(5)));
        assert!(!range.contains(&Value::Int(0)));
        assert!(Range::all().contains(&Value::from("anything")));
    }

    #[test]
    fn test_range_is_empty() {
        assert!(Range::closed(5, 1).is_empty());
        assert!(Range::open(3, 3).is_empty());
        assert!(!Range::closed(3, 3).is_empty());
        assert!(!Range::at_least(3).is_empty());
    }

    #[test]
    fn test_range_intersect() {
        let r = Range::closed(1, 10).intersect(&Range::open(5, 20));
        assert_eq!(r, Range::new(Bound::Excluded(Value::Int(5)), Bound::Included(Value::Int(10))));

        let tie = Range::closed(1, 5).intersect(&Range::closed_open(1, 5));
        assert_eq!(tie, Range::closed_open(1, 5));

        let half = Range::at_least(3).intersect(&Range::at_most(7));
        assert_eq!(half, Range::closed(3, 7));
    }

    #[test]
    fn test_predicate_intersect() {
        let exists = Predicate::Exists;
        let in_ab = Predicate::in_values(["a", "b"]);
        assert_eq!(exists.intersect(&in_ab), in_ab);

        let in_bc = Predicate::in_values(["b", "c"]);
        assert_eq!(in_ab.intersect(&in_bc), Predicate::eq("b"));

        let range = Predicate::Range(Range::closed("a", "a"));
        assert_eq!(range.intersect(&in_ab), Predicate::eq("a"));

        let disjoint = Predicate::eq("a").intersect(&Predicate::eq("c"));
        assert_eq!(disjoint, Predicate::In(BTreeSet::new()));
        assert!(!disjoint.matches(&Value::from("a")));
    }
}
