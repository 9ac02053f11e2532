//! Arena nodes for trees over one-hot indicator columns.
//!
//! A split tests one indicator: rows where it is unset go left, rows where
//! it is set go right. There are no thresholds.

use std::fmt;

/// Position of an indicator column in a [`OneHotMatrix`](grantwise_features::OneHotMatrix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the column position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// Return `true` if this indicator is set in `active`, a sorted list of
    /// set columns.
    #[must_use]
    pub fn is_set_in(self, active: &[usize]) -> bool {
        active.binary_search(&self.0).is_ok()
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arena slot of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the arena slot.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Child followed by a row with set columns `active` at a split on `feature`.
pub(crate) fn branch(
    feature: FeatureIndex,
    left: NodeIndex,
    right: NodeIndex,
    active: &[usize],
) -> NodeIndex {
    if feature.is_set_in(active) { right } else { left }
}

/// Gini or entropy of a node's grant/deny mix.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A classification tree node; the root sits at slot 0.
#[derive(Debug, Clone)]
pub enum Node {
    Split {
        /// Indicator tested.
        feature: FeatureIndex,
        /// Rows with the indicator unset.
        left: NodeIndex,
        /// Rows with the indicator set.
        right: NodeIndex,
        /// Impurity before the split.
        impurity: Impurity,
        /// Bootstrap rows that reached the node.
        n_samples: usize,
        /// Sample-weighted impurity decrease, summed into importances.
        impurity_decrease: f64,
    },
    Leaf {
        /// Share of granted rows; the tree's probability for the leaf.
        positive_fraction: f64,
        impurity: Impurity,
        n_samples: usize,
    },
}

impl Node {
    /// Return the node's impurity.
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training rows that reached the node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_lookup_in_sorted_row() {
        let active = [0, 4, 9];
        assert!(FeatureIndex::new(4).is_set_in(&active));
        assert!(!FeatureIndex::new(5).is_set_in(&active));
        assert!(!FeatureIndex::new(0).is_set_in(&[]));
    }

    #[test]
    fn branch_goes_right_when_set() {
        let (left, right) = (NodeIndex::new(1), NodeIndex::new(2));
        let feature = FeatureIndex::new(3);
        assert_eq!(branch(feature, left, right, &[1, 3]), right);
        assert_eq!(branch(feature, left, right, &[1, 2]), left);
        assert_eq!(branch(feature, left, right, &[]), left);
    }

    #[test]
    fn display_formats() {
        assert_eq!(FeatureIndex::new(3).to_string(), "3");
        assert_eq!(NodeIndex::new(12).to_string(), "#12");
        assert_eq!(Impurity::new(0.5).to_string(), "0.500000");
    }

    #[test]
    fn accessors_cover_both_variants() {
        let leaf = Node::Leaf {
            positive_fraction: 0.75,
            impurity: Impurity::new(0.375),
            n_samples: 8,
        };
        let split = Node::Split {
            feature: FeatureIndex::new(2),
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            impurity: Impurity::new(0.48),
            n_samples: 20,
            impurity_decrease: 0.16,
        };
        assert!(leaf.is_leaf() && !split.is_leaf());
        assert_eq!((leaf.n_samples(), split.n_samples()), (8, 20));
        assert_eq!(split.impurity().value(), 0.48);
    }
}
