//! Shared primitives, traits, and utilities for the energy-test workspace.
//!
//! `energy-core` provides the foundation that `energy-stats` builds on:
//!
//! - **Error types** — [`EnergyError`] and [`Result`] for structured error handling
//! - **Traits** — [`Scored`] and [`Summarizable`] for result types
//! - **Matrix** — [`Matrix`], dense 2-D storage reshaped from row- or column-major buffers
//! - **Permutations** — [`PermutationSource`], the injectable random permutation generator

pub mod error;
pub mod matrix;
pub mod permutation;
pub mod traits;

pub use error::{EnergyError, Result};
pub use matrix::{Layout, Matrix};
pub use permutation::PermutationSource;
pub use traits::*;
