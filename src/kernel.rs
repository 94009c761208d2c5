//! Kernel (similarity) matrix construction.
//!
//! Turns raw feature vectors into a symmetric similarity matrix `A₀`,
//! the input every other stage consumes. Three built-in kernels are
//! provided, plus hooks for user-supplied functions and precomputed
//! matrices.
//!
//! | Kernel | Formula |
//! |--------|---------|
//! | Linear | x·y |
//! | RBF | exp(−γ·‖x−y‖²) |
//! | Polynomial | (γ·x·y + coef0)^degree |
//!
//! γ can be given directly or derived from a bandwidth as γ = 1/(2σ²).
//! RBF and polynomial kernels fail with a configuration error before any
//! matrix is built when neither is available.
//!
//! The evaluation mode of a user-supplied kernel is declared up front via
//! [`KernelSpec`] — either per-pair ([`KernelSpec::Elementwise`]) or
//! whole-matrix ([`KernelSpec::Matrix`]) — rather than inferred by probing
//! the function with dummy arguments.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::{Array2, ArrayView1};

use crate::error::{Error, Result};

/// Per-pair kernel function: `k(x_i, x_j) -> f64`.
pub type ElementwiseKernel = Arc<dyn Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64 + Send + Sync>;

/// Whole-matrix kernel function: `k(X) -> n×n similarity matrix`.
pub type MatrixKernel = Arc<dyn Fn(&Array2<f64>) -> Array2<f64> + Send + Sync>;

/// Kernel selection, with the evaluation mode declared explicitly.
#[derive(Clone)]
pub enum KernelSpec {
    /// Dot product.
    Linear,
    /// Radial basis function: exp(−γ·‖x−y‖²).
    Rbf,
    /// Polynomial: (γ·x·y + coef0)^degree.
    Polynomial,
    /// Input rows already form the similarity matrix; passed through after
    /// a squareness check.
    Precomputed,
    /// User function evaluated once per (i, j) pair.
    Elementwise(ElementwiseKernel),
    /// User function evaluated once on the whole feature matrix.
    Matrix(MatrixKernel),
}

impl KernelSpec {
    /// Short name, used when configuring the downstream classifier.
    pub fn name(&self) -> &'static str {
        match self {
            KernelSpec::Linear => "linear",
            KernelSpec::Rbf => "rbf",
            KernelSpec::Polynomial => "polynomial",
            KernelSpec::Precomputed => "precomputed",
            KernelSpec::Elementwise(_) | KernelSpec::Matrix(_) => "custom",
        }
    }
}

impl fmt::Debug for KernelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelSpec::Elementwise(_) => f.write_str("Elementwise(..)"),
            KernelSpec::Matrix(_) => f.write_str("Matrix(..)"),
            other => f.write_str(other.name()),
        }
    }
}

/// Named kernel parameters, validated at construction rather than looked up
/// reflectively at use time.
///
/// `passthrough` captures classifier-only parameters; the kernel itself
/// ignores them, and the large-sample path forwards them to the classifier
/// (which in turn ignores the ones it does not recognize).
#[derive(Debug, Clone)]
pub struct KernelParams {
    /// Kernel coefficient γ. Takes precedence over `sigma`.
    pub gamma: Option<f64>,
    /// Bandwidth σ; γ = 1/(2σ²) when `gamma` is unset.
    pub sigma: Option<f64>,
    /// Polynomial degree.
    pub degree: f64,
    /// Polynomial bias term.
    pub coef0: f64,
    /// Parameters forwarded untouched to the classifier collaborator.
    pub passthrough: BTreeMap<String, f64>,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            gamma: None,
            sigma: None,
            degree: 3.0,
            coef0: 1.0,
            passthrough: BTreeMap::new(),
        }
    }
}

impl KernelParams {
    /// γ if set, otherwise derived from σ as 1/(2σ²). `None` when neither
    /// is available (or σ is zero).
    pub fn resolved_gamma(&self) -> Option<f64> {
        match (self.gamma, self.sigma) {
            (Some(g), _) => Some(g),
            (None, Some(s)) if s != 0.0 => Some(1.0 / (2.0 * s * s)),
            _ => None,
        }
    }
}

/// Builds symmetric similarity matrices from feature data.
#[derive(Debug, Clone)]
pub struct KernelBuilder {
    spec: KernelSpec,
    params: KernelParams,
}

impl KernelBuilder {
    /// Create a builder for the given kernel with default parameters.
    pub fn new(spec: KernelSpec) -> Self {
        Self {
            spec,
            params: KernelParams::default(),
        }
    }

    /// Linear kernel shorthand.
    pub fn linear() -> Self {
        Self::new(KernelSpec::Linear)
    }

    /// RBF kernel shorthand; γ (or σ) still has to be supplied.
    pub fn rbf() -> Self {
        Self::new(KernelSpec::Rbf)
    }

    /// Replace all parameters.
    pub fn with_params(mut self, params: KernelParams) -> Self {
        self.params = params;
        self
    }

    /// Set γ directly.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.params.gamma = Some(gamma);
        self
    }

    /// Set the bandwidth σ (γ derived as 1/(2σ²) when γ is unset).
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.params.sigma = Some(sigma);
        self
    }

    /// Set the polynomial degree.
    pub fn with_degree(mut self, degree: f64) -> Self {
        self.params.degree = degree;
        self
    }

    /// Set the polynomial bias term.
    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.params.coef0 = coef0;
        self
    }

    /// The configured kernel.
    pub fn spec(&self) -> &KernelSpec {
        &self.spec
    }

    /// The configured parameters.
    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    /// Kernel name forwarded to the classifier on the large-sample path.
    pub fn kernel_name(&self) -> &'static str {
        self.spec.name()
    }

    /// Resolve γ from the configuration.
    ///
    /// Order: explicit γ, then 1/(2σ²). Fails when the kernel needs γ and
    /// neither is available.
    pub fn resolved_gamma(&self) -> Result<f64> {
        self.params.resolved_gamma().ok_or_else(|| Error::Configuration {
            parameter: "gamma",
            message: format!("{} kernel requires gamma or a nonzero sigma", self.kernel_name()),
        })
    }

    /// Build the symmetric similarity matrix A₀ for `x` (n rows).
    ///
    /// `x` is never mutated. Built-in kernels produce exactly symmetric
    /// output: entry (i, j) and entry (j, i) come from the same summation.
    pub fn build(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        match &self.spec {
            KernelSpec::Linear => Ok(gram(x)),
            KernelSpec::Rbf => {
                let gamma = self.resolved_gamma()?;
                let dist = pairwise_distances(x);
                Ok(dist.mapv(|d| (-gamma * d * d).exp()))
            }
            KernelSpec::Polynomial => {
                let gamma = self.resolved_gamma()?;
                let coef0 = self.params.coef0;
                let degree = self.params.degree;
                Ok(gram(x).mapv(|v| (gamma * v + coef0).powf(degree)))
            }
            KernelSpec::Precomputed => {
                if x.ncols() != n {
                    return Err(Error::DimensionMismatch {
                        expected: n,
                        found: x.ncols(),
                    });
                }
                Ok(x.clone())
            }
            KernelSpec::Elementwise(f) => Ok(elementwise_matrix(x, f)),
            KernelSpec::Matrix(f) => {
                let a = f(x);
                if a.nrows() != n || a.ncols() != n {
                    return Err(Error::DimensionMismatch {
                        expected: n,
                        found: a.nrows().max(a.ncols()),
                    });
                }
                Ok(a)
            }
        }
    }
}

/// Gram matrix X·Xᵗ, mirrored from the upper triangle so that entry (i, j)
/// and entry (j, i) are the same float.
fn gram(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut g = Array2::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let v = x.row(i).dot(&x.row(j));
            g[[i, j]] = v;
            g[[j, i]] = v;
        }
    }
    g
}

/// Pairwise Euclidean distance matrix: nonnegative, symmetric, zero diagonal.
pub fn pairwise_distances(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut dist = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = x
                .row(i)
                .iter()
                .zip(x.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            dist[[i, j]] = d;
            dist[[j, i]] = d;
        }
    }
    dist
}

/// All-pairs evaluation of a per-pair kernel, parallel across rows when the
/// `parallel` feature is enabled.
fn elementwise_matrix(x: &Array2<f64>, f: &ElementwiseKernel) -> Array2<f64> {
    let n = x.nrows();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| f(x.row(i), x.row(j))).collect())
            .collect();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((n, n), flat).expect("n*n values for an n×n matrix")
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut a = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                a[[i, j]] = f(x.row(i), x.row(j));
            }
        }
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Array2<f64> {
        array![[1.0, 2.0], [3.0, -1.0], [0.5, 0.5], [-2.0, 4.0]]
    }

    #[test]
    fn test_builtin_kernels_exactly_symmetric() {
        let x = sample();
        let builders = [
            KernelBuilder::linear(),
            KernelBuilder::rbf().with_gamma(0.3),
            KernelBuilder::new(KernelSpec::Polynomial).with_gamma(0.5).with_degree(2.0),
        ];
        for b in builders {
            let a = b.build(&x).unwrap();
            for i in 0..x.nrows() {
                for j in 0..x.nrows() {
                    assert_eq!(a[[i, j]], a[[j, i]], "asymmetry at ({i}, {j})");
                }
            }
        }
    }

    #[test]
    fn test_linear_is_dot_product() {
        let x = sample();
        let a = KernelBuilder::linear().build(&x).unwrap();
        assert_eq!(a[[0, 1]], 1.0 * 3.0 + 2.0 * -1.0);
        assert_eq!(a[[2, 2]], 0.5);
    }

    #[test]
    fn test_gamma_from_sigma() {
        let x = sample();
        let sigma = 1.5;
        let from_sigma = KernelBuilder::rbf().with_sigma(sigma).build(&x).unwrap();
        let from_gamma = KernelBuilder::rbf()
            .with_gamma(1.0 / (2.0 * sigma * sigma))
            .build(&x)
            .unwrap();
        for (a, b) in from_sigma.iter().zip(from_gamma.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rbf_without_gamma_or_sigma_fails() {
        let x = sample();
        let err = KernelBuilder::rbf().build(&x).unwrap_err();
        assert!(matches!(err, Error::Configuration { parameter: "gamma", .. }));
    }

    #[test]
    fn test_rbf_diagonal_is_one() {
        let x = sample();
        let a = KernelBuilder::rbf().with_sigma(2.0).build(&x).unwrap();
        for i in 0..x.nrows() {
            assert_eq!(a[[i, i]], 1.0);
        }
    }

    #[test]
    fn test_precomputed_requires_square() {
        let x = sample(); // 4×2
        let err = KernelBuilder::new(KernelSpec::Precomputed).build(&x).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 4, found: 2 }));
    }

    #[test]
    fn test_elementwise_matches_linear() {
        let x = sample();
        let f: ElementwiseKernel =
            Arc::new(|a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>| a.dot(&b));
        let custom = KernelBuilder::new(KernelSpec::Elementwise(f)).build(&x).unwrap();
        let builtin = KernelBuilder::linear().build(&x).unwrap();
        for (a, b) in custom.iter().zip(builtin.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_matrix_kernel_shape_checked() {
        let x = sample();
        let f: MatrixKernel =
            Arc::new(|x: &Array2<f64>| Array2::zeros((x.nrows(), x.nrows() + 1)));
        let err = KernelBuilder::new(KernelSpec::Matrix(f)).build(&x).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_empty_input() {
        let x: Array2<f64> = Array2::zeros((0, 3));
        assert_eq!(KernelBuilder::linear().build(&x).unwrap_err(), Error::EmptyInput);
    }

    #[test]
    fn test_pairwise_distances_properties() {
        let x = sample();
        let d = pairwise_distances(&x);
        for i in 0..x.nrows() {
            assert_eq!(d[[i, i]], 0.0);
            for j in 0..x.nrows() {
                assert!(d[[i, j]] >= 0.0);
                assert_eq!(d[[i, j]], d[[j, i]]);
            }
        }
    }
}
