//! Rank-quality metrics
//!
//! Both metrics take the item ids of one query in ranked order and the weak
//! label of every item of that query. Items without a label have zero gain.
//!
//! NDCG uses linear gain (the label itself) with a `log2(position + 1)`
//! discount, positions starting at 1. The ideal ordering is computed from all
//! labels of the query, not only the ranked prefix.

use jobrank_core::Grade;
use std::collections::BTreeMap;

/// Labels of one query, by item id.
pub type Judgments<'a> = BTreeMap<&'a str, Grade>;

fn dcg(gains: impl Iterator<Item = f64>, k: usize) -> f64 {
    gains
        .take(k)
        .enumerate()
        .map(|(i, gain)| gain / ((i + 2) as f64).log2())
        .sum()
}

/// Discounted cumulative gain of the top `k`, normalized by the ideal ordering.
///
/// Gain is linear in the grade (`gain = label`), discounted by `log2(rank + 1)`.
/// The ideal ordering uses every judged item, not only the ranked ones.
pub fn ndcg_at_k(ranked: &[&str], judgments: &Judgments<'_>, k: usize) -> f64 {
    if k == 0 || ranked.is_empty() {
        return 0.0;
    }
    let actual = dcg(
        ranked
            .iter()
            .map(|id| judgments.get(id).map_or(0.0, |g| g.gain())),
        k,
    );

    let mut ideal: Vec<f64> = judgments.values().map(|g| g.gain()).collect();
    ideal.sort_by(|a, b| b.total_cmp(a));
    let ideal = dcg(ideal.into_iter(), k);

    if ideal == 0.0 {
        0.0
    } else {
        actual / ideal
    }
}

/// Share of the top `k` with a label of at least `threshold`.
///
/// Always divided by `k`, so a query with fewer than `k` items cannot reach 1.
pub fn precision_at_k(ranked: &[&str], judgments: &Judgments<'_>, k: usize, threshold: Grade) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let relevant = ranked
        .iter()
        .take(k)
        .filter(|id| judgments.get(*id).is_some_and(|g| *g >= threshold))
        .count();
    relevant as f64 / k as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(v: i64) -> Grade {
        Grade::new(v).unwrap()
    }

    fn judgments() -> Judgments<'static> {
        [("a", 5), ("b", 3), ("c", 1), ("d", 4)]
            .into_iter()
            .map(|(id, g)| (id, grade(g)))
            .collect()
    }

    #[test]
    fn test_ideal_order_scores_one() {
        let j = judgments();
        assert!((ndcg_at_k(&["a", "d", "b", "c"], &j, 10) - 1.0).abs() < 1e-12);
        assert!((ndcg_at_k(&["a", "d", "b", "c"], &j, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ndcg_linear_gain() {
        let j = judgments();
        // DCG@2 of [c, a] = 1/1 + 5/log2(3); IDCG@2 = 5 + 4/log2(3)
        let expected = (1.0 + 5.0 / 3f64.log2()) / (5.0 + 4.0 / 3f64.log2());
        assert!((ndcg_at_k(&["c", "a", "b", "d"], &j, 2) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_worse_order_scores_lower() {
        let j = judgments();
        let good = ndcg_at_k(&["a", "d", "c", "b"], &j, 5);
        let bad = ndcg_at_k(&["c", "b", "d", "a"], &j, 5);
        assert!(good > bad);
        assert!(bad > 0.0);
    }

    #[test]
    fn test_precision_threshold_and_divisor() {
        let j = judgments();
        let ranked = ["a", "b", "d", "c"];
        assert_eq!(precision_at_k(&ranked, &j, 2, grade(4)), 0.5);
        assert_eq!(precision_at_k(&ranked, &j, 3, grade(4)), 2.0 / 3.0);
        // Only 4 items but divided by 10
        assert_eq!(precision_at_k(&ranked, &j, 10, grade(4)), 0.2);
    }

    #[test]
    fn test_unknown_items_have_no_gain() {
        let j = judgments();
        assert_eq!(ndcg_at_k(&["x", "y"], &j, 2), 0.0);
        assert_eq!(precision_at_k(&["x"], &j, 1, grade(1)), 0.0);
        assert_eq!(ndcg_at_k(&[], &j, 5), 0.0);
    }
}
