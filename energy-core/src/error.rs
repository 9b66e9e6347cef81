//! Structured error types for the energy-test workspace.

use thiserror::Error;

/// Unified error type for all energy-test operations.
#[derive(Debug, Error)]
pub enum EnergyError {
    /// Invalid input (bad arguments, out-of-range values, inconsistent sizes)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A flat buffer does not hold the number of entries its declared shape needs
    #[error("dimension mismatch: expected {expected} entries, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The allocator could not provide a working buffer
    #[error("allocation failed: {0}")]
    Allocation(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, EnergyError>;
