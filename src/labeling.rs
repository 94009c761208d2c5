//! Cluster labels from the merge hierarchy.
//!
//! The merge tree already encodes a full clustering at every granularity:
//! withholding the last K−1 merges leaves exactly K connected components.
//! Labels are representative leaf ids (the index of some original sample),
//! optionally remapped to contiguous integers or to a caller-supplied
//! scheme.

use log::debug;

use crate::basis::MergeStep;
use crate::error::{Error, Result};

/// Estimate the cluster count from per-merge diagnostics by first-gap
/// detection.
///
/// Scans from the second entry; the first index `i` where consecutive
/// diagnostics differ by more than 1 marks the boundary between meaningful
/// and noise merges, giving n − i clusters. A jump of that size in the
/// (log-scaled) merge cost is an order-of-magnitude change. With no
/// qualifying gap the count cannot be estimated and `NoGapFound` is
/// returned; callers wanting a different policy should supply an explicit
/// cluster count instead.
pub fn estimate_cluster_count(diagnostics: &[f64], n: usize) -> Result<usize> {
    for i in 1..diagnostics.len() {
        if (diagnostics[i - 1] - diagnostics[i]).abs() > 1.0 {
            debug!("diagnostic gap at merge {i}: estimating {} clusters", n - i);
            return Ok(n - i);
        }
    }
    Err(Error::NoGapFound)
}

/// Assign each of the n samples a representative leaf id such that exactly
/// `k` distinct labels remain.
///
/// Walks merges from coarse to fine, skipping the final k−1 merges, and
/// propagates the surviving slot's label onto the absorbed slot. Requires
/// `tree` to hold at least n−k merges and `k` in `[1, n]`.
pub fn assign_labels(tree: &[MergeStep], n: usize, k: usize) -> Result<Vec<usize>> {
    if k == 0 || k > n {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: n,
        });
    }
    if tree.len() < n - k {
        return Err(Error::Other(format!(
            "merge tree has {} entries, need {} for {k} clusters over {n} samples",
            tree.len(),
            n - k
        )));
    }

    let mut labels: Vec<usize> = (0..n).collect();
    for merge in tree[..n - k].iter().rev() {
        labels[merge.absorbed] = labels[merge.survivor];
    }
    Ok(labels)
}

/// Remap representative labels to contiguous integers `0..K−1`, assigned in
/// ascending order of the representatives.
pub fn relabel_contiguous(labels: &[usize]) -> Vec<usize> {
    let unique = sorted_unique(labels);
    labels
        .iter()
        .map(|l| unique.binary_search(l).unwrap_or(0))
        .collect()
}

/// Remap representative labels through a caller-supplied scheme.
///
/// The K distinct representatives, sorted ascending, map to the first K
/// entries of `scheme` in order. Fails when the scheme is shorter than K.
pub fn relabel_with<L: Clone>(labels: &[usize], scheme: &[L]) -> Result<Vec<L>> {
    let unique = sorted_unique(labels);
    if scheme.len() < unique.len() {
        return Err(Error::InsufficientLabels {
            provided: scheme.len(),
            required: unique.len(),
        });
    }
    Ok(labels
        .iter()
        .map(|l| scheme[unique.binary_search(l).unwrap_or(0)].clone())
        .collect())
}

fn sorted_unique(labels: &[usize]) -> Vec<usize> {
    let mut unique = labels.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn chain_tree(n: usize) -> Vec<MergeStep> {
        // Merge 1 into 0, then 2 into 0, and so on: a left-deep hierarchy.
        (1..n)
            .map(|absorbed| MergeStep { survivor: 0, absorbed })
            .collect()
    }

    fn pair_tree() -> Vec<MergeStep> {
        vec![
            MergeStep { survivor: 0, absorbed: 1 },
            MergeStep { survivor: 2, absorbed: 3 },
            MergeStep { survivor: 0, absorbed: 2 },
        ]
    }

    #[test]
    fn test_gap_detection() {
        // Costs drop by more than 1 between entries 1 and 2 (0-indexed).
        let diagnostics = [0.3, 0.1, -4.0, -4.2];
        let k = estimate_cluster_count(&diagnostics, 5).unwrap();
        assert_eq!(k, 5 - 2);
    }

    #[test]
    fn test_gap_at_first_scan_position() {
        let diagnostics = [0.0, -3.0, -3.1];
        assert_eq!(estimate_cluster_count(&diagnostics, 4).unwrap(), 3);
    }

    #[test]
    fn test_no_gap_is_an_error() {
        let diagnostics = [0.0, -0.5, -1.0, -1.5];
        assert_eq!(
            estimate_cluster_count(&diagnostics, 5).unwrap_err(),
            Error::NoGapFound
        );
    }

    #[test]
    fn test_assign_labels_distinct_count_for_every_k() {
        let n = 6;
        let tree = chain_tree(n);
        for k in 1..=n {
            let labels = assign_labels(&tree, n, k).unwrap();
            let distinct: HashSet<usize> = labels.iter().copied().collect();
            assert_eq!(distinct.len(), k, "k = {k}");
            // Every label is some sample's own index.
            for &l in &labels {
                assert!(l < n);
            }
        }
    }

    #[test]
    fn test_assign_labels_two_pairs() {
        let labels = assign_labels(&pair_tree(), 4, 2).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_assign_labels_k_equals_n_is_identity() {
        let labels = assign_labels(&pair_tree(), 4, 4).unwrap();
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_assign_labels_invalid_k() {
        let tree = pair_tree();
        assert!(matches!(
            assign_labels(&tree, 4, 0).unwrap_err(),
            Error::InvalidClusterCount { requested: 0, n_items: 4 }
        ));
        assert!(matches!(
            assign_labels(&tree, 4, 5).unwrap_err(),
            Error::InvalidClusterCount { requested: 5, n_items: 4 }
        ));
    }

    #[test]
    fn test_relabel_contiguous() {
        let labels = [7, 7, 2, 5, 2];
        let relabeled = relabel_contiguous(&labels);
        // Representatives 2 < 5 < 7 map to 0, 1, 2.
        assert_eq!(relabeled, vec![2, 2, 0, 1, 0]);
        let distinct: HashSet<usize> = relabeled.into_iter().collect();
        assert_eq!(distinct, HashSet::from([0, 1, 2]));
    }

    #[test]
    fn test_relabel_with_scheme() {
        let labels = [0, 0, 3, 3];
        let named = relabel_with(&labels, &["a", "b"]).unwrap();
        assert_eq!(named, vec!["a", "a", "b", "b"]);
        for l in &named {
            assert!(["a", "b"].contains(l));
        }
    }

    #[test]
    fn test_relabel_with_short_scheme() {
        let labels = [0, 0, 3, 3];
        let err = relabel_with(&labels, &["a"]).unwrap_err();
        assert_eq!(err, Error::InsufficientLabels { provided: 1, required: 2 });
    }
}
