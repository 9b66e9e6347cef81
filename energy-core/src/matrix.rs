//! Dense two-dimensional `f64` storage with an explicit shape.
//!
//! [`Matrix`] always stores its entries in row-major order. Callers holding a
//! flat buffer in either order reshape it once with [`Matrix::from_buffer`];
//! everything downstream indexes by `(row, col)` and never needs to know how
//! the source was laid out.

use crate::{EnergyError, Result, Summarizable};

/// Storage order of a flat buffer handed to [`Matrix::from_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Layout {
    /// Entry `(i, j)` lives at `i * cols + j`.
    #[default]
    RowMajor,
    /// Entry `(i, j)` lives at `j * rows + i`.
    ColumnMajor,
}

impl Layout {
    /// Map a boundary `byrow` flag to a layout.
    pub fn from_row_flag(by_row: bool) -> Self {
        if by_row {
            Layout::RowMajor
        } else {
            Layout::ColumnMajor
        }
    }
}

/// A dense `rows × cols` matrix of `f64` in row-major order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Allocate a zero-filled matrix.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyError::Allocation`] if `rows * cols` overflows or the
    /// allocator cannot satisfy the request.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            EnergyError::Allocation(format!("{}x{} matrix overflows usize", rows, cols))
        })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            EnergyError::Allocation(format!("{}x{} matrix: {}", rows, cols, e))
        })?;
        data.resize(len, 0.0);
        Ok(Self { data, rows, cols })
    }

    /// Reshape a flat buffer into a matrix, honoring its storage order.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyError::DimensionMismatch`] if `flat.len() != rows * cols`.
    pub fn from_buffer(flat: &[f64], rows: usize, cols: usize, layout: Layout) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            EnergyError::Allocation(format!("{}x{} matrix overflows usize", rows, cols))
        })?;
        if flat.len() != expected {
            return Err(EnergyError::DimensionMismatch {
                expected,
                actual: flat.len(),
            });
        }
        let mut m = Self::zeros(rows, cols)?;
        match layout {
            Layout::RowMajor => m.data.copy_from_slice(flat),
            Layout::ColumnMajor => {
                for j in 0..cols {
                    for i in 0..rows {
                        m.data[i * cols + j] = flat[j * rows + i];
                    }
                }
            }
        }
        Ok(m)
    }

    /// Build a matrix from row slices. All rows must have the same length.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(EnergyError::InvalidInput(format!(
                    "Matrix::from_rows: row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
        }
        let mut m = Self::zeros(rows.len(), cols)?;
        for (i, row) in rows.iter().enumerate() {
            m.data[i * cols..(i + 1) * cols].copy_from_slice(row);
        }
        Ok(m)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whether the matrix is square.
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Entry at `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// Overwrite entry `(i, j)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.cols + j] = value;
    }

    /// Borrow row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Raw row-major storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

impl Summarizable for Matrix {
    fn summary(&self) -> String {
        format!("Matrix: {}x{}", self.rows, self.cols)
    }
}
