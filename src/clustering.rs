//! Treelet clustering, with sample-then-generalize scaling.
//!
//! Small inputs are clustered directly: build the kernel matrix, fit the
//! treelet basis, and cut the merge tree. The decomposition and tree walk
//! are O(n²)–O(n³) and matrix-heavy, so past `max_sample` rows the engine
//! instead clusters a uniform subsample, keeps the K largest clusters, and
//! trains a classifier to extend their labels to every row.
//!
//! Labels are representative sample indices; see
//! [`labels_contiguous`](TreeletClustering::labels_contiguous) and
//! [`labels_as`](TreeletClustering::labels_as) for remapped views.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use ndarray::{Array2, Axis};
use rand::prelude::*;

use crate::classify::{Classifier, KernelCentroidClassifier};
use crate::error::{Error, Result};
use crate::kernel::KernelBuilder;
use crate::labeling::{assign_labels, estimate_cluster_count};
use crate::treelets::KernelTreelets;

const DEFAULT_MAX_SAMPLE: usize = 500;

#[derive(Clone)]
struct FitState {
    n_total: usize,
    sample_size: usize,
    /// Ascending row indices drawn on the large path; `None` on the small path.
    sample_index: Option<Vec<usize>>,
    n_clusters: usize,
    /// Labels of the (sub)sample the basis was fitted on.
    sample_labels: Vec<usize>,
    /// Final labels for every input row.
    labels: Vec<usize>,
}

/// Hard clustering from a kernel treelet basis.
///
/// Holds a [`KernelTreelets`] engine as a component and derives cluster
/// labels from its merge tree. Construction is by builder methods, fitting
/// by [`fit`](Self::fit); a failed fit leaves any previous fit untouched.
#[derive(Clone)]
pub struct TreeletClustering {
    engine: KernelTreelets,
    n_clusters: Option<usize>,
    rank: isize,
    max_sample: usize,
    seed: Option<u64>,
    state: Option<FitState>,
}

impl TreeletClustering {
    /// Create a clusterer over the given kernel, auto-estimating the
    /// cluster count from dendrogram diagnostics.
    pub fn new(kernel: KernelBuilder) -> Self {
        Self {
            engine: KernelTreelets::new(kernel),
            n_clusters: None,
            rank: -1,
            max_sample: DEFAULT_MAX_SAMPLE,
            seed: None,
            state: None,
        }
    }

    /// Fix the number of clusters instead of estimating it.
    pub fn with_n_clusters(mut self, k: usize) -> Self {
        self.n_clusters = Some(k);
        self
    }

    /// Rank parameter forwarded to the underlying engine fit (default −1).
    pub fn with_rank(mut self, k: isize) -> Self {
        self.rank = k;
        self
    }

    /// Largest input clustered directly; bigger inputs are subsampled
    /// (default 500).
    pub fn with_max_sample(mut self, max_sample: usize) -> Self {
        self.max_sample = max_sample;
        self
    }

    /// Seed for subsample selection, for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The underlying decomposition engine.
    pub fn engine(&self) -> &KernelTreelets {
        &self.engine
    }

    /// Apply the fitted rotation sequence to the rows of `v`, skipping the
    /// `k` coarsest steps (see [`KernelTreelets::transform`]).
    pub fn transform(&self, v: &Array2<f64>, k: isize) -> Result<Array2<f64>> {
        self.engine.transform(v, k)
    }

    /// Fit the clustering to feature rows `x`.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if let Some(k) = self.n_clusters {
            if k == 0 || k > n.min(self.max_sample) {
                return Err(Error::InvalidClusterCount {
                    requested: k,
                    n_items: n.min(self.max_sample),
                });
            }
        }

        if n <= self.max_sample {
            let (engine, k, labels) = self.fit_sample(x)?;
            info!("clustered {n} samples directly into {k} clusters");
            self.engine = engine;
            self.state = Some(FitState {
                n_total: n,
                sample_size: n,
                sample_index: None,
                n_clusters: k,
                sample_labels: labels.clone(),
                labels,
            });
            return Ok(());
        }

        // Large path: cluster a subsample, then generalize.
        let indices = self.draw_sample(n);
        debug!(
            "subsampled {} of {n} rows (seed {:?})",
            indices.len(),
            self.seed
        );
        let sampled = x.select(Axis(0), &indices);
        let (engine, k, sample_labels) = self.fit_sample(&sampled)?;

        // Keep only the K largest clusters; the classifier never sees
        // members of the rest.
        let (kept_rows, kept_labels) = largest_clusters(&sample_labels, k);
        let train_x = sampled.select(Axis(0), &kept_rows);

        let classifier = self.train_classifier(&train_x, &kept_labels)?;
        let labels = classifier.predict(x)?;
        info!(
            "generalized {k} clusters from {} sampled rows to {n} total",
            indices.len()
        );

        self.engine = engine;
        self.state = Some(FitState {
            n_total: n,
            sample_size: indices.len(),
            sample_index: Some(indices),
            n_clusters: k,
            sample_labels,
            labels,
        });
        Ok(())
    }

    /// Final labels, one representative sample index per input row.
    pub fn labels(&self) -> Result<&[usize]> {
        Ok(&self.state()?.labels)
    }

    /// Final labels remapped to contiguous integers `0..K−1`.
    pub fn labels_contiguous(&self) -> Result<Vec<usize>> {
        Ok(crate::labeling::relabel_contiguous(&self.state()?.labels))
    }

    /// Final labels remapped through a caller-supplied scheme.
    pub fn labels_as<L: Clone>(&self, scheme: &[L]) -> Result<Vec<L>> {
        crate::labeling::relabel_with(&self.state()?.labels, scheme)
    }

    /// Labels of the fitted (sub)sample, before generalization.
    pub fn sample_labels(&self) -> Result<&[usize]> {
        Ok(&self.state()?.sample_labels)
    }

    /// Row indices the basis was fitted on; `None` when the input was small
    /// enough to fit directly.
    pub fn sample_index(&self) -> Result<Option<&[usize]>> {
        Ok(self.state()?.sample_index.as_deref())
    }

    /// Number of clusters in the fitted model.
    pub fn cluster_count(&self) -> Result<usize> {
        Ok(self.state()?.n_clusters)
    }

    /// Number of rows the treelet basis was actually fitted on.
    pub fn sample_size(&self) -> Result<usize> {
        Ok(self.state()?.sample_size)
    }

    /// Number of rows in the fitted input, zero before the first fit.
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.n_total)
    }

    /// True before the first successful fit.
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }

    /// Run the direct path on `x`, returning the fitted engine alongside
    /// the cluster count and labels so the caller can install everything
    /// atomically.
    fn fit_sample(&self, x: &Array2<f64>) -> Result<(KernelTreelets, usize, Vec<usize>)> {
        let mut engine = self.engine.clone();
        engine.fit(x, self.rank)?;
        let model = engine.model()?;
        let k = match self.n_clusters {
            Some(k) => k,
            None => estimate_cluster_count(model.diagnostics(), model.n())?,
        };
        let labels = assign_labels(model.tree(), model.n(), k)?;
        Ok((engine, k, labels))
    }

    /// Ascending sample of `max_sample` distinct row indices.
    fn draw_sample(&self, n: usize) -> Vec<usize> {
        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };
        let mut indices = rand::seq::index::sample(&mut rng, n, self.max_sample).into_vec();
        indices.sort_unstable();
        indices
    }

    /// Train the configured classifier, falling back once to the default
    /// configuration on failure. A second failure is fatal.
    fn train_classifier(
        &self,
        train_x: &Array2<f64>,
        labels: &[usize],
    ) -> Result<KernelCentroidClassifier> {
        let kernel = self.engine.kernel();
        let attempt = KernelCentroidClassifier::with_kernel(kernel.kernel_name(), kernel.params())
            .and_then(|mut clf| clf.train(train_x, labels).map(|()| clf));
        match attempt {
            Ok(clf) => Ok(clf),
            Err(err) => {
                warn!("classifier training failed ({err}); retrying with default configuration");
                let mut clf = KernelCentroidClassifier::default();
                clf.train(train_x, labels)
                    .map_err(|e| Error::ClassifierTraining(e.to_string()))?;
                Ok(clf)
            }
        }
    }

    fn state(&self) -> Result<&FitState> {
        self.state.as_ref().ok_or(Error::NotFitted)
    }
}

/// Rows belonging to the `k` clusters with the most members, plus their
/// labels. Ties break toward the smaller representative.
fn largest_clusters(labels: &[usize], k: usize) -> (Vec<usize>, Vec<usize>) {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut tally: Vec<(usize, usize)> = counts.into_iter().collect();
    tally.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let keep: Vec<usize> = tally.into_iter().take(k).map(|(label, _)| label).collect();

    let mut rows = Vec::new();
    let mut kept_labels = Vec::new();
    for (row, &label) in labels.iter().enumerate() {
        if keep.contains(&label) {
            rows.push(row);
            kept_labels.push(label);
        }
    }
    (rows, kept_labels)
}
