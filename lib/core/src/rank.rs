//! Deterministic ordering of scored items

use crate::feature::FeatureVector;
use serde::Serialize;
use std::collections::BTreeMap;

/// An item to be ranked for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub item_id: String,
    pub features: FeatureVector,
}

/// A ranked item with its score and the feature values it was scored on.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedItem {
    /// 1-based position
    pub rank: usize,
    pub item_id: String,
    pub score: f64,
    pub features: BTreeMap<String, f64>,
}

/// Sort by score descending; ties are broken by id ascending.
pub fn sort_by_score_desc<T>(items: &mut [T], key: impl Fn(&T) -> (f64, &str)) {
    items.sort_by(|a, b| {
        let (score_a, id_a) = key(a);
        let (score_b, id_b) = key(b);
        score_b.total_cmp(&score_a).then_with(|| id_a.cmp(id_b))
    });
}

/// Order `(item id, score)` pairs and return the item ids best first.
pub fn ranked_ids(mut scored: Vec<(String, f64)>) -> Vec<String> {
    sort_by_score_desc(&mut scored, |(id, score)| (*score, id.as_str()));
    scored.into_iter().map(|(id, _)| id).collect()
}
