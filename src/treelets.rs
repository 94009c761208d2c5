//! Kernel treelet engine: similarity matrix, orthogonal basis, and reduced
//! kernel behind one fit/transform surface.

use std::sync::Arc;

use log::info;
use ndarray::Array2;

use crate::basis::{JacobiTreelets, TreeletBuilder, TreeletModel};
use crate::decompose;
use crate::error::{Error, Result};
use crate::kernel::KernelBuilder;
use crate::transform;

#[derive(Clone)]
struct Fitted {
    model: TreeletModel,
    a0: Array2<f64>,
    a_k: Array2<f64>,
}

/// Treelet decomposition of a kernel matrix.
///
/// Owns a [`KernelBuilder`] and a treelet builder (the external
/// collaborator; [`JacobiTreelets`] by default) and caches one fit at a
/// time: the similarity matrix A₀, the basis, and the reduced kernel A_k.
/// A failed [`fit`](Self::fit) leaves any previous fit untouched.
#[derive(Clone)]
pub struct KernelTreelets {
    kernel: KernelBuilder,
    builder: Arc<dyn TreeletBuilder + Send + Sync>,
    fitted: Option<Fitted>,
}

impl KernelTreelets {
    /// Create an engine with the default treelet builder.
    pub fn new(kernel: KernelBuilder) -> Self {
        Self {
            kernel,
            builder: Arc::new(JacobiTreelets),
            fitted: None,
        }
    }

    /// Swap in a different treelet builder.
    pub fn with_builder(mut self, builder: Arc<dyn TreeletBuilder + Send + Sync>) -> Self {
        self.builder = builder;
        self
    }

    /// The configured kernel.
    pub fn kernel(&self) -> &KernelBuilder {
        &self.kernel
    }

    /// Fit on feature rows (or a precomputed similarity matrix, when the
    /// kernel is [`KernelSpec::Precomputed`](crate::kernel::KernelSpec)).
    ///
    /// Builds A₀, runs the treelet builder, and caches the rank-k reduced
    /// kernel. `k` follows the transform convention: nonpositive values
    /// wrap as n+k, so the conventional default is −1.
    pub fn fit(&mut self, x: &Array2<f64>, k: isize) -> Result<()> {
        let a0 = self.kernel.build(x)?;
        let model = self.builder.build(&a0)?;
        let a_k = decompose::reduced_kernel(&model, &a0, k)?;
        info!(
            "fitted treelet basis over {} samples ({} kernel, rank parameter {k})",
            model.n(),
            self.kernel.kernel_name()
        );
        self.fitted = Some(Fitted { model, a0, a_k });
        Ok(())
    }

    /// Apply the fitted rotation sequence to the rows of `v`, skipping the
    /// `k` coarsest steps.
    pub fn transform(&self, v: &Array2<f64>, k: isize) -> Result<Array2<f64>> {
        transform::transform(&self.fitted()?.model, v, k)
    }

    /// Tree-ordered diagonal factor of `m` (see [`decompose::decompose`]).
    pub fn decompose(&self, m: &Array2<f64>) -> Result<Array2<f64>> {
        decompose::decompose(&self.fitted()?.model, m)
    }

    /// The similarity matrix A₀ of the current fit.
    pub fn similarity(&self) -> Result<&Array2<f64>> {
        Ok(&self.fitted()?.a0)
    }

    /// The cached reduced kernel A_k of the current fit.
    pub fn reduced(&self) -> Result<&Array2<f64>> {
        Ok(&self.fitted()?.a_k)
    }

    /// The fitted treelet model.
    pub fn model(&self) -> Result<&TreeletModel> {
        Ok(&self.fitted()?.model)
    }

    /// Number of fitted samples, zero before the first fit.
    pub fn len(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.model.n())
    }

    /// True before the first successful fit.
    pub fn is_empty(&self) -> bool {
        self.fitted.is_none()
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted.as_ref().ok_or(Error::NotFitted)
    }
}
