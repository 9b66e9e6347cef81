//! Pairwise distance matrices over a pooled sample.
//!
//! The matrix is built once per test and then only read: every permutation
//! replicate indexes into the same storage.

use energy_core::{EnergyError, Layout, Matrix, Result, Summarizable};
use log::{trace, warn};

/// Symmetric `n × n` matrix of pairwise distances between pooled observations.
///
/// Stored densely so the statistic kernels can index `(i, j)` in any order
/// without branching on which triangle holds the value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceMatrix {
    matrix: Matrix,
}

impl DistanceMatrix {
    /// Euclidean distances between the rows of `samples` (N observations × d
    /// dimensions).
    pub fn from_samples(samples: &Matrix) -> Result<Self> {
        Self::from_samples_with_exponent(samples, 1.0)
    }

    /// Distances `‖xᵢ − xⱼ‖^exponent` between the rows of `samples`.
    ///
    /// Any exponent in `(0, 2]` keeps the energy statistic a proper
    /// divergence; 1 is the usual Euclidean choice. Non-finite coordinates are
    /// not rejected and show up as non-finite distances.
    ///
    /// # Errors
    ///
    /// Returns an error if `exponent` is outside `(0, 2]`, or if the `N × N`
    /// storage cannot be allocated.
    pub fn from_samples_with_exponent(samples: &Matrix, exponent: f64) -> Result<Self> {
        if !(exponent > 0.0 && exponent <= 2.0) {
            return Err(EnergyError::InvalidInput(format!(
                "distance exponent must be in (0, 2], got {}",
                exponent
            )));
        }
        let n = samples.rows();
        trace!(
            "building {}x{} distance matrix from {} dimensions (exponent {})",
            n,
            n,
            samples.cols(),
            exponent
        );
        let mut matrix = Matrix::zeros(n, n)?;

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let upper: Vec<Vec<f64>> = (0..n)
                .into_par_iter()
                .map(|i| {
                    ((i + 1)..n)
                        .map(|j| powered_distance(samples.row(i), samples.row(j), exponent))
                        .collect()
                })
                .collect();
            for (i, row) in upper.iter().enumerate() {
                for (offset, &d) in row.iter().enumerate() {
                    let j = i + 1 + offset;
                    matrix.set(i, j, d);
                    matrix.set(j, i, d);
                }
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            for i in 0..n {
                for j in (i + 1)..n {
                    let d = powered_distance(samples.row(i), samples.row(j), exponent);
                    matrix.set(i, j, d);
                    matrix.set(j, i, d);
                }
            }
        }

        Ok(Self { matrix })
    }

    /// Wrap a precomputed distance matrix without touching its entries.
    ///
    /// Symmetry and the zero diagonal are not enforced; a matrix violating
    /// either is logged and then used as given.
    ///
    /// # Errors
    ///
    /// Returns an error if `distances` is not square.
    pub fn from_distances(distances: Matrix) -> Result<Self> {
        if !distances.is_square() {
            return Err(EnergyError::InvalidInput(format!(
                "distance matrix must be square, got {}x{}",
                distances.rows(),
                distances.cols()
            )));
        }
        let dm = Self { matrix: distances };
        if !dm.is_symmetric_with_zero_diagonal() {
            warn!(
                "supplied {}x{} distance matrix is not symmetric with a zero diagonal; using it unaltered",
                dm.n(),
                dm.n()
            );
        }
        Ok(dm)
    }

    /// Build from a flat buffer of `n` pooled observations.
    ///
    /// When `dim == 0` the buffer is read as an `n × n` distance matrix and
    /// used directly. Otherwise it is an `n × dim` sample matrix and
    /// Euclidean distances are computed from it.
    pub fn from_buffer(flat: &[f64], n: usize, dim: usize, layout: Layout) -> Result<Self> {
        if dim == 0 {
            Self::from_distances(Matrix::from_buffer(flat, n, n, layout)?)
        } else {
            Self::from_samples(&Matrix::from_buffer(flat, n, dim, layout)?)
        }
    }

    /// Distance between pooled observations `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix.get(i, j)
    }

    /// Number of pooled observations.
    pub fn n(&self) -> usize {
        self.matrix.rows()
    }

    /// Borrow the underlying dense matrix.
    pub fn as_matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Whether `D[i][j] == D[j][i]` and `D[i][i] == 0` hold exactly.
    pub fn is_symmetric_with_zero_diagonal(&self) -> bool {
        let n = self.n();
        (0..n).all(|i| {
            self.get(i, i) == 0.0 && ((i + 1)..n).all(|j| self.get(i, j) == self.get(j, i))
        })
    }
}

impl Summarizable for DistanceMatrix {
    fn summary(&self) -> String {
        format!("DistanceMatrix: {}x{}", self.n(), self.n())
    }
}

/// `‖a − b‖^exponent`.
#[inline]
pub(crate) fn powered_distance(a: &[f64], b: &[f64], exponent: f64) -> f64 {
    let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    if exponent == 1.0 {
        sq.sqrt()
    } else {
        sq.powf(exponent / 2.0)
    }
}
