//! Choosing one candidate when a key has several.
//!
//! The golden record keeps one RNA id per SIRET and one coordinate pair per
//! postal code. Nothing ranks the candidates, so the choice is a policy, not
//! a correctness property: [`AnyValue`] takes whatever arrived first and makes
//! no promise about which that is; [`Lowest`] picks the minimum of a total
//! order for callers that need reproducible output.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub trait TieBreak {
    /// Index of the chosen candidate, `None` only when `candidates` is empty.
    fn choose<T, F>(&self, candidates: &[T], cmp: F) -> Option<usize>
    where
        F: Fn(&T, &T) -> Ordering;
}

/// First candidate in arrival order. Arrival order is unspecified.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyValue;

impl TieBreak for AnyValue {
    fn choose<T, F>(&self, candidates: &[T], _cmp: F) -> Option<usize>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        if candidates.is_empty() { None } else { Some(0) }
    }
}

/// Minimum under the supplied order; ties resolve to the earliest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowest;

impl TieBreak for Lowest {
    fn choose<T, F>(&self, candidates: &[T], cmp: F) -> Option<usize>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| cmp(*a, *b))
            .map(|(i, _)| i)
    }
}

/// Configurable selection between the built-in policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    #[default]
    AnyValue,
    Lowest,
}

impl TieBreak for TieBreakPolicy {
    fn choose<T, F>(&self, candidates: &[T], cmp: F) -> Option<usize>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        match self {
            TieBreakPolicy::AnyValue => AnyValue.choose(candidates, cmp),
            TieBreakPolicy::Lowest => Lowest.choose(candidates, cmp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_candidates() {
        let empty: [&str; 0] = [];
        assert_eq!(AnyValue.choose(&empty, |a, b| a.cmp(b)), None);
        assert_eq!(Lowest.choose(&empty, |a, b| a.cmp(b)), None);
    }

    #[test]
    fn test_any_value_returns_a_candidate() {
        let ids = ["W3", "W1", "W2"];
        let i = AnyValue.choose(&ids, |a, b| a.cmp(b)).unwrap();
        assert!(i < ids.len());
    }

    #[test]
    fn test_lowest_is_order_independent() {
        let a = ["W3", "W1", "W2"];
        let b = ["W2", "W3", "W1"];
        let pick_a = a[Lowest.choose(&a, |x, y| x.cmp(y)).unwrap()];
        let pick_b = b[Lowest.choose(&b, |x, y| x.cmp(y)).unwrap()];
        assert_eq!(pick_a, "W1");
        assert_eq!(pick_a, pick_b);
    }

    #[test]
    fn test_lowest_on_coordinates() {
        let points = [(48.9, 2.3), (48.8, 2.4), (48.8, 2.2)];
        let i = Lowest
            .choose(&points, |a: &(f64, f64), b: &(f64, f64)| {
                a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
            })
            .unwrap();
        assert_eq!(points[i], (48.8, 2.2));
    }

    #[test]
    fn test_policy_dispatch() {
        let ids = ["b", "a"];
        let i = TieBreakPolicy::Lowest.choose(&ids, |x, y| x.cmp(y)).unwrap();
        assert_eq!(ids[i], "a");
        let parsed: TieBreakPolicy = serde_json::from_str("\"any_value\"").unwrap();
        assert_eq!(parsed, TieBreakPolicy::AnyValue);
    }
}
