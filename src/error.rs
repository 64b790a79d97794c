//! Unified error handling for gravtree.
//!
//! Every failure inside the clustering loop is fatal: an invariant violation
//! implies silent data loss, so the engine aborts rather than recovers.
//! Transient I/O errors on the emit stream are not retried.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors produced by ingest, the clustering engine, and emit.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A row in the input file could not be parsed.
    #[error("input line {line}: {message}")]
    InputFormat { line: u64, message: String },

    /// Read or write failure on the input or output stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal bookkeeping violation: dead-region reference, vacated slot,
    /// missing best partner.
    #[error("invariant violated: {message}")]
    Invariant { message: String },

    /// A potential came out NaN or negative. Signals a coordinate or weight
    /// bug upstream; infinite potentials are valid (duplicate coordinates).
    #[error("numeric error: potential between regions {region_a} and {region_b} is {value}")]
    Numeric {
        region_a: u32,
        region_b: u32,
        value: f64,
    },
}

impl ClusterError {
    /// Shorthand for an [`ClusterError::Invariant`] with a formatted message.
    pub fn invariant(message: impl Into<String>) -> Self {
        ClusterError::Invariant {
            message: message.into(),
        }
    }
}

/// Extension trait for turning `Option` into invariant errors.
pub trait OptionExt<T> {
    /// Unwrap or fail with [`ClusterError::Invariant`].
    fn ok_or_invariant(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invariant(self, message: &str) -> Result<T> {
        self.ok_or_else(|| ClusterError::invariant(message))
    }
}
