//! Target statistics (CTRs) replacing raw category codes.

use std::collections::HashMap;

use grantwise_features::Category;

/// Smoothed positive rate with one pseudo-count at `prior`.
fn smoothed(positives: usize, count: usize, prior: f64) -> f64 {
    (positives as f64 + prior) / (count as f64 + 1.0)
}

/// Ordered target statistics for one training column.
///
/// Rows are visited in `permutation` order; each row sees only the labels
/// of rows visited before it, so its own label never leaks into its value.
pub(crate) fn ordered_ctr(
    column: &[Category],
    labels: &[bool],
    permutation: &[usize],
    prior: f64,
) -> Vec<f64> {
    let mut seen: HashMap<Category, (usize, usize)> = HashMap::new();
    let mut out = vec![0.0; column.len()];
    for &row in permutation {
        let entry = seen.entry(column[row]).or_insert((0, 0));
        out[row] = smoothed(entry.1, entry.0, prior);
        entry.0 += 1;
        entry.1 += usize::from(labels[row]);
    }
    out
}

/// Full-training statistics of one column, used at inference time.
#[derive(Debug, Clone)]
pub(crate) struct TargetStatistics {
    counts: HashMap<Category, (usize, usize)>,
    prior: f64,
}

impl TargetStatistics {
    pub(crate) fn fit(column: &[Category], labels: &[bool], prior: f64) -> Self {
        let mut counts: HashMap<Category, (usize, usize)> = HashMap::new();
        for (&category, &label) in column.iter().zip(labels) {
            let entry = counts.entry(category).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += usize::from(label);
        }
        Self { counts, prior }
    }

    /// Return the statistic of `category`; an unseen category gets `prior`.
    pub(crate) fn value(&self, category: Category) -> f64 {
        self.counts
            .get(&category)
            .map_or(self.prior, |&(count, positives)| {
                smoothed(positives, count, self.prior)
            })
    }

    pub(crate) fn n_categories(&self) -> usize {
        self.counts.len()
    }
}
