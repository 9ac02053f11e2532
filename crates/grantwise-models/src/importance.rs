//! Ranking of per-feature importances.

use serde::Serialize;

/// A ranked feature with name, importance score, and rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeature {
    /// Feature name.
    pub name: String,
    /// Importance score or coefficient.
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Zip names with importances, sort descending and assign 1-based ranks.
///
/// Ties keep the input order. Extra names or values beyond the shorter of
/// the two slices are ignored.
#[must_use]
pub fn rank_features(names: &[String], importances: &[f64]) -> Vec<RankedFeature> {
    let mut features: Vec<RankedFeature> = names
        .iter()
        .zip(importances)
        .map(|(name, &importance)| RankedFeature {
            name: name.clone(),
            importance,
            rank: 0, // will be set after sorting
        })
        .collect();

    features.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    for (i, feat) in features.iter_mut().enumerate() {
        feat.rank = i + 1;
    }

    features
}
