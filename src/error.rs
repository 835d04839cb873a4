//! Error types for the neuronet engine.
//!
//! Only recoverable conditions are represented here. Contract violations
//! (out-of-range coordinates, zero extents, edges queried from a neuron they do
//! not touch) are programming errors and panic at the call site.

use thiserror::Error;

/// The main error type for neuronet operations.
#[derive(Error, Debug)]
pub enum NetError {
    /// Training was requested before a training set was bound to the net.
    #[error("No training set available")]
    MissingTrainingSet,

    /// Invalid configuration or training request.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A vector or matrix does not match the size of the layer it is applied to.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The size required by the net.
        expected: usize,
        /// The size that was supplied.
        actual: usize,
    },

    /// The input or output layer has not been designated yet.
    #[error("Layer not set: {0}")]
    LayerNotSet(&'static str),

    /// A function descriptor name did not resolve.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// An execution unit could not be acquired.
    #[error("Execution unit {index} unavailable: {reason}")]
    UnitUnavailable {
        /// Index of the unit that was requested.
        index: usize,
        /// Why the unit could not be selected.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A snapshot file is malformed or of the wrong kind.
    #[error("Invalid net format: {0}")]
    InvalidFormat(String),
}

/// Result type alias for neuronet operations.
pub type Result<T> = std::result::Result<T, NetError>;

impl From<bincode::Error> for NetError {
    fn from(err: bincode::Error) -> Self {
        NetError::Serialization(err.to_string())
    }
}
