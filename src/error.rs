use core::fmt;

/// Result alias for `treelet`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by kernel construction, decomposition, and clustering.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// A kernel or clustering parameter is missing or invalid.
    Configuration {
        /// Parameter name.
        parameter: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Kernel name not recognized.
    UnknownKernel(String),

    /// Matrix row count does not match the fitted sample count.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid number of clusters requested.
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// Custom label scheme has fewer entries than there are clusters.
    InsufficientLabels {
        /// Entries provided by the scheme.
        provided: usize,
        /// Distinct clusters that need a label.
        required: usize,
    },

    /// Classifier training failed (after the fallback retry).
    ClassifierTraining(String),

    /// Dendrogram diagnostics contain no qualifying gap, so the cluster
    /// count cannot be auto-estimated.
    NoGapFound,

    /// Operation requires a fitted model.
    NotFitted,

    /// Generic error with message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::Configuration { parameter, message } => {
                write!(f, "invalid configuration for '{parameter}': {message}")
            }
            Error::UnknownKernel(name) => write!(f, "unknown kernel '{name}'"),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InvalidClusterCount { requested, n_items } => {
                write!(f, "cannot create {requested} clusters from {n_items} items")
            }
            Error::InsufficientLabels { provided, required } => {
                write!(
                    f,
                    "label scheme provides {provided} labels but {required} clusters need one"
                )
            }
            Error::ClassifierTraining(msg) => write!(f, "classifier training failed: {msg}"),
            Error::NoGapFound => {
                write!(
                    f,
                    "no gap in dendrogram diagnostics; cluster count cannot be estimated"
                )
            }
            Error::NotFitted => write!(f, "model has not been fitted"),
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
