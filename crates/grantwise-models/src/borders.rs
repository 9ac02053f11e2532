//! Quantile borders for quantizing real-valued features.
//!
//! Borders are computed once per feature from the training values; every
//! later split candidate is a border index, so scoring a feature costs one
//! histogram pass instead of a sort.

/// Pre-computed quantile borders for all features.
#[derive(Debug, Clone)]
pub(crate) struct QuantileBorders {
    /// `borders[feature]` is strictly increasing and lies strictly inside
    /// the training range of that feature.
    borders: Vec<Vec<f64>>,
}

impl QuantileBorders {
    /// Build up to `border_count` borders per feature column.
    ///
    /// Borders sit at the `k / (border_count + 1)` quantiles with linear
    /// interpolation; duplicates and borders equal to the column minimum or
    /// maximum are dropped. A constant column gets no borders.
    pub(crate) fn build(columns: &[Vec<f64>], border_count: usize) -> Self {
        let n_bins = border_count + 1;
        let borders = columns
            .iter()
            .map(|col| {
                if col.is_empty() {
                    return Vec::new();
                }

                let mut sorted = col.clone();
                sorted.sort_unstable_by(|a, b| a.total_cmp(b));
                let n = sorted.len();
                let (min, max) = (sorted[0], sorted[n - 1]);
                if min == max {
                    return Vec::new();
                }

                let mut raw: Vec<f64> = (1..n_bins)
                    .map(|k| {
                        let pos = (k as f64 / n_bins as f64) * (n - 1) as f64;
                        let lo = pos.floor() as usize;
                        let hi = (lo + 1).min(n - 1);
                        let frac = pos - lo as f64;
                        sorted[lo] + frac * (sorted[hi] - sorted[lo])
                    })
                    .collect();
                raw.dedup_by(|a, b| *a == *b);
                raw.retain(|&e| e > min && e < max);
                raw
            })
            .collect();

        Self { borders }
    }

    /// Return the bin of `value`: the number of borders strictly below it.
    ///
    /// `value > border(feature, k)` holds exactly when `bin > k`.
    pub(crate) fn bin(&self, feature: usize, value: f64) -> usize {
        self.borders[feature].partition_point(|&e| e < value)
    }

    /// Return the number of borders of a feature.
    pub(crate) fn n_borders(&self, feature: usize) -> usize {
        self.borders[feature].len()
    }

    #[cfg(test)]
    pub(crate) fn border(&self, feature: usize, k: usize) -> f64 {
        self.borders[feature][k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_column_has_no_borders() {
        let b = QuantileBorders::build(&[vec![0.3; 10]], 32);
        assert_eq!(b.n_borders(0), 0);
        assert_eq!(b.bin(0, 0.3), 0);
    }

    #[test]
    fn borders_are_increasing_and_inside_range() {
        let col: Vec<f64> = (0..100).map(|i| f64::from(i) / 100.0).collect();
        let b = QuantileBorders::build(&[col], 4);
        assert_eq!(b.n_borders(0), 4);
        for k in 1..4 {
            assert!(b.border(0, k) > b.border(0, k - 1));
        }
        assert!(b.border(0, 0) > 0.0 && b.border(0, 3) < 0.99);
    }

    #[test]
    fn few_distinct_values_collapse() {
        let col = vec![0.1, 0.1, 0.1, 0.9, 0.9, 0.9];
        let b = QuantileBorders::build(&[col], 32);
        assert!(b.n_borders(0) >= 1);
        assert_eq!(b.bin(0, 0.1), 0);
        assert_eq!(b.bin(0, 0.9), b.n_borders(0));
    }

    #[test]
    fn bin_matches_greater_than_border() {
        let col: Vec<f64> = (0..50).map(f64::from).collect();
        let b = QuantileBorders::build(&[col], 8);
        for v in [0.0, 3.5, 12.0, 24.5, 49.0] {
            let bin = b.bin(0, v);
            for k in 0..b.n_borders(0) {
                assert_eq!(v > b.border(0, k), bin > k);
            }
        }
    }
}
