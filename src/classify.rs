//! Classifier collaborator for the large-sample path.
//!
//! Clustering a subsample is cheap; extending its partition to the full
//! dataset needs a trained decision boundary. The [`Classifier`] trait is
//! that narrow contract, and [`KernelCentroidClassifier`] is the bundled
//! implementation: nearest class mean in the kernel feature space,
//!
//! ```text
//! ‖φ(x) − μ_C‖² = k(x,x) − (2/|C|)·Σᵢ k(x, xᵢ) + (1/|C|²)·ΣᵢΣⱼ k(xᵢ, xⱼ)
//! ```
//!
//! The k(x,x) term is shared by every class and dropped; the class constant
//! is precomputed at train time, so prediction is one kernel sweep over the
//! training rows per query.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1};

use crate::error::{Error, Result};
use crate::kernel::KernelParams;

/// Narrow training/prediction contract used to generalize a sampled
/// clustering to the full dataset.
pub trait Classifier {
    /// Fit the decision boundary to labeled feature rows.
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()>;

    /// Predict a label for every row of `features`.
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;
}

#[derive(Debug, Clone, Copy)]
enum PairKernel {
    Linear,
    Rbf { gamma: f64 },
    Polynomial { gamma: f64, coef0: f64, degree: f64 },
}

impl PairKernel {
    fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match *self {
            PairKernel::Linear => a.dot(&b),
            PairKernel::Rbf { gamma } => {
                let d2: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * d2).exp()
            }
            PairKernel::Polynomial { gamma, coef0, degree } => {
                (gamma * a.dot(&b) + coef0).powf(degree)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Class {
    label: usize,
    members: Vec<usize>,
    /// (1/|C|²)·ΣᵢΣⱼ k(xᵢ, xⱼ) over the class members.
    self_term: f64,
}

/// Nearest-kernel-centroid classifier, the bundled [`Classifier`].
///
/// Configured from a kernel-name string plus [`KernelParams`]; parameters
/// the named kernel does not use (including everything in `passthrough`)
/// are ignored. Unknown names and unresolvable required parameters error at
/// construction, which is what triggers the caller's fallback-to-defaults
/// retry.
#[derive(Debug, Clone)]
pub struct KernelCentroidClassifier {
    kernel: PairKernel,
    train_x: Option<Array2<f64>>,
    classes: Vec<Class>,
}

impl Default for KernelCentroidClassifier {
    fn default() -> Self {
        Self {
            kernel: PairKernel::Linear,
            train_x: None,
            classes: Vec::new(),
        }
    }
}

impl KernelCentroidClassifier {
    /// Configure for the named kernel: "linear", "rbf", or
    /// "poly"/"polynomial".
    pub fn with_kernel(name: &str, params: &KernelParams) -> Result<Self> {
        let kernel = match name {
            "linear" => PairKernel::Linear,
            "rbf" => PairKernel::Rbf {
                gamma: params.resolved_gamma().ok_or_else(|| Error::Configuration {
                    parameter: "gamma",
                    message: "rbf classifier requires gamma or a nonzero sigma".to_string(),
                })?,
            },
            "poly" | "polynomial" => PairKernel::Polynomial {
                gamma: params.resolved_gamma().ok_or_else(|| Error::Configuration {
                    parameter: "gamma",
                    message: "polynomial classifier requires gamma or a nonzero sigma".to_string(),
                })?,
                coef0: params.coef0,
                degree: params.degree,
            },
            other => return Err(Error::UnknownKernel(other.to_string())),
        };
        Ok(Self {
            kernel,
            train_x: None,
            classes: Vec::new(),
        })
    }
}

impl Classifier for KernelCentroidClassifier {
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        if features.nrows() == 0 {
            return Err(Error::EmptyInput);
        }
        if features.nrows() != labels.len() {
            return Err(Error::DimensionMismatch {
                expected: features.nrows(),
                found: labels.len(),
            });
        }

        let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &label) in labels.iter().enumerate() {
            by_label.entry(label).or_default().push(row);
        }

        let mut classes = Vec::with_capacity(by_label.len());
        for (label, members) in by_label {
            let m = members.len() as f64;
            let mut self_term = 0.0;
            for &i in &members {
                for &j in &members {
                    self_term += self.kernel.eval(features.row(i), features.row(j));
                }
            }
            classes.push(Class {
                label,
                members,
                self_term: self_term / (m * m),
            });
        }

        self.train_x = Some(features.clone());
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let train_x = self.train_x.as_ref().ok_or(Error::NotFitted)?;
        if features.ncols() != train_x.ncols() {
            return Err(Error::DimensionMismatch {
                expected: train_x.ncols(),
                found: features.ncols(),
            });
        }

        let mut out = Vec::with_capacity(features.nrows());
        for row in features.rows() {
            let mut best: Option<(f64, usize)> = None;
            for class in &self.classes {
                let m = class.members.len() as f64;
                let cross: f64 = class
                    .members
                    .iter()
                    .map(|&i| self.kernel.eval(row, train_x.row(i)))
                    .sum::<f64>()
                    / m;
                let dist = class.self_term - 2.0 * cross;
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, class.label));
                }
            }
            out.push(best.ok_or(Error::NotFitted)?.1);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.2],
            [5.0, 5.1],
            [5.2, 4.9],
            [5.1, 5.0],
        ];
        (x, vec![0, 0, 0, 3, 3, 3])
    }

    #[test]
    fn test_linear_recovers_training_labels() {
        let (x, y) = blobs();
        let mut clf = KernelCentroidClassifier::default();
        clf.train(&x, &y).unwrap();
        assert_eq!(clf.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_rbf_classifies_held_out_points() {
        let (x, y) = blobs();
        let params = KernelParams {
            sigma: Some(1.0),
            ..KernelParams::default()
        };
        let mut clf = KernelCentroidClassifier::with_kernel("rbf", &params).unwrap();
        clf.train(&x, &y).unwrap();

        let queries = array![[0.1, 0.1], [5.0, 5.0]];
        assert_eq!(clf.predict(&queries).unwrap(), vec![0, 3]);
    }

    #[test]
    fn test_unknown_kernel_name() {
        let err =
            KernelCentroidClassifier::with_kernel("custom", &KernelParams::default()).unwrap_err();
        assert_eq!(err, Error::UnknownKernel("custom".to_string()));
    }

    #[test]
    fn test_rbf_without_gamma_fails_at_construction() {
        let err =
            KernelCentroidClassifier::with_kernel("rbf", &KernelParams::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration { parameter: "gamma", .. }));
    }

    #[test]
    fn test_predict_before_train() {
        let clf = KernelCentroidClassifier::default();
        let q = array![[0.0, 0.0]];
        assert_eq!(clf.predict(&q).unwrap_err(), Error::NotFitted);
    }

    #[test]
    fn test_label_count_mismatch() {
        let (x, _) = blobs();
        let mut clf = KernelCentroidClassifier::default();
        let err = clf.train(&x, &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }
}
