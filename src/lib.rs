//! # treelet
//!
//! Kernel treelets: a hierarchical orthogonal basis built from a similarity
//! matrix, used for low-rank kernel decomposition and hard clustering, with
//! a sample-then-generalize path for datasets too large to decompose
//! directly.
//!
//! A fit proceeds leaf-first: [`kernel::KernelBuilder`] turns feature rows
//! into a symmetric similarity matrix; a [`basis::TreeletBuilder`] (the
//! bundled [`JacobiTreelets`] by default) produces the merge tree, rotation
//! sequence, and per-level diagnostics; [`transform`] and [`decompose`]
//! consume those to coarsen matrices and factor the kernel; and
//! [`labeling`] cuts the merge tree into cluster labels.
//!
//! ```
//! use ndarray::array;
//! use treelet::{KernelBuilder, TreeletClustering};
//!
//! let points = array![[4.0, 0.1], [4.1, 0.0], [0.1, 3.9], [0.0, 4.0]];
//!
//! let mut tc = TreeletClustering::new(KernelBuilder::linear()).with_n_clusters(2);
//! tc.fit(&points).unwrap();
//!
//! let labels = tc.labels().unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//! ```

pub mod basis;
pub mod classify;
pub mod clustering;
pub mod decompose;
/// Error types used across `treelet`.
pub mod error;
pub mod kernel;
pub mod labeling;
pub mod transform;
pub mod treelets;

pub use basis::{JacobiTreelets, MergeStep, RotationStep, TreeletBuilder, TreeletModel};
pub use classify::{Classifier, KernelCentroidClassifier};
pub use clustering::TreeletClustering;
pub use error::{Error, Result};
pub use kernel::{pairwise_distances, KernelBuilder, KernelParams, KernelSpec};
pub use labeling::{assign_labels, estimate_cluster_count, relabel_contiguous, relabel_with};
pub use treelets::KernelTreelets;
