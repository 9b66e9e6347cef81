//! Permutation test for equal distributions based on the energy statistic.
//!
//! The test builds the distance matrix once, computes the observed k-sample
//! statistic under the identity permutation, then redraws the pooled index
//! permutation `R` times and recomputes the statistic for each draw. The
//! approximate p-value is `(#{replicates > observed} + 1) / (R + 1)`.
//!
//! ```
//! use energy_stats::etest::EnergyTest;
//! use energy_stats::Estimator;
//! use energy_core::Matrix;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let rows: [&[f64]; 6] = [&[0.0], &[1.0], &[2.0], &[10.0], &[11.0], &[12.0]];
//! let samples = Matrix::from_rows(&rows).unwrap();
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let result = EnergyTest::new()
//!     .replicates(199)
//!     .estimator(Estimator::Biased)
//!     .run_on_samples(&samples, &[3, 3], &mut rng)
//!     .unwrap();
//! assert!((result.statistic - 82.0 / 3.0).abs() < 1e-9);
//! assert!(result.p_value.unwrap() < 0.2);
//! ```

use energy_core::permutation::{fill_identity, is_permutation};
use energy_core::{
    EnergyError, Layout, Matrix, PermutationSource, Result, Scored, Summarizable,
};
use log::{debug, warn};

use crate::distance::DistanceMatrix;
use crate::groups::GroupIndex;
use crate::statistic::{multi_sample_statistic, Estimator};

/// Result of an energy permutation test.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnergyTestResult {
    /// Observed k-sample E-statistic.
    pub statistic: f64,
    /// Statistic under each random permutation, in draw order.
    pub replicates: Vec<f64>,
    /// Permutation p-value; `None` when no replicates were requested.
    pub p_value: Option<f64>,
    /// Number of replicates strictly greater than the observed statistic.
    pub n_exceeding: usize,
    /// Group sizes in pooled order.
    pub sizes: Vec<usize>,
    /// Within-sample normalization used.
    pub estimator: Estimator,
    /// Method name.
    pub method: String,
}

impl Scored for EnergyTestResult {
    fn score(&self) -> f64 {
        self.p_value.unwrap_or(f64::NAN)
    }
}

impl Summarizable for EnergyTestResult {
    fn summary(&self) -> String {
        match self.p_value {
            Some(p) => format!(
                "{}: statistic={:.4}, replicates={}, p={:.6}",
                self.method,
                self.statistic,
                self.replicates.len(),
                p,
            ),
            None => format!("{}: statistic={:.4}", self.method, self.statistic),
        }
    }
}

/// Options for the energy permutation test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnergyTest {
    replicates: usize,
    estimator: Estimator,
}

impl Default for EnergyTest {
    fn default() -> Self {
        Self {
            replicates: 999,
            estimator: Estimator::Biased,
        }
    }
}

impl EnergyTest {
    /// 999 replicates with the plug-in estimator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of permutation replicates `R`. Zero computes only the observed
    /// statistic and leaves the p-value unset.
    pub fn replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    /// Within-sample normalization.
    pub fn estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Run the test on a pooled `N × d` sample matrix, rows grouped
    /// contiguously by `sizes`.
    ///
    /// Sizes are validated before the `N × N` distance matrix is allocated.
    pub fn run_on_samples<S>(
        &self,
        samples: &Matrix,
        sizes: &[usize],
        source: &mut S,
    ) -> Result<EnergyTestResult>
    where
        S: PermutationSource + ?Sized,
    {
        let groups = GroupIndex::new(sizes)?;
        check_total(&groups, samples.rows())?;
        let distances = DistanceMatrix::from_samples(samples)?;
        self.run_with_groups(&distances, &groups, source)
    }

    /// Run the test on a prebuilt distance matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 2 groups are given, any group is empty,
    /// or the sizes do not add up to the matrix size.
    pub fn run<S>(
        &self,
        distances: &DistanceMatrix,
        sizes: &[usize],
        source: &mut S,
    ) -> Result<EnergyTestResult>
    where
        S: PermutationSource + ?Sized,
    {
        let groups = GroupIndex::new(sizes)?;
        check_total(&groups, distances.n())?;
        self.run_with_groups(distances, &groups, source)
    }

    fn run_with_groups<S>(
        &self,
        distances: &DistanceMatrix,
        groups: &GroupIndex,
        source: &mut S,
    ) -> Result<EnergyTestResult>
    where
        S: PermutationSource + ?Sized,
    {
        let n = groups.total();
        debug!(
            "energy test: n={}, k={}, replicates={}, estimator={:?}",
            n,
            groups.n_groups(),
            self.replicates,
            self.estimator
        );

        let mut perm = try_buffer::<usize>(n, "permutation")?;
        perm.resize(n, 0);
        fill_identity(&mut perm);
        let statistic = multi_sample_statistic(distances, groups, &perm, self.estimator);
        if !statistic.is_finite() {
            warn!("observed energy statistic is not finite ({})", statistic);
        }

        let mut replicates = try_buffer::<f64>(self.replicates, "replicate")?;
        let mut n_exceeding = 0usize;
        for _ in 0..self.replicates {
            source.permute(&mut perm);
            debug_assert!(is_permutation(&perm));
            let e = multi_sample_statistic(distances, groups, &perm, self.estimator);
            if statistic < e {
                n_exceeding += 1;
            }
            replicates.push(e);
        }

        Ok(self.finish(statistic, replicates, n_exceeding, groups))
    }

    /// Run the replicates in parallel on the rayon thread pool.
    ///
    /// Replicate `b` draws its permutation from a ChaCha8 generator seeded
    /// with `seed` on stream `b`, into a buffer private to its worker, so the
    /// result does not depend on the number of threads. The replicate stream
    /// differs from [`EnergyTest::run`] with a generator seeded the same way.
    #[cfg(feature = "parallel")]
    pub fn run_parallel(
        &self,
        distances: &DistanceMatrix,
        sizes: &[usize],
        seed: u64,
    ) -> Result<EnergyTestResult> {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;
        use rayon::prelude::*;

        let groups = GroupIndex::new(sizes)?;
        check_total(&groups, distances.n())?;
        let n = groups.total();
        debug!(
            "parallel energy test: n={}, k={}, replicates={}, estimator={:?}",
            n,
            groups.n_groups(),
            self.replicates,
            self.estimator
        );

        let identity = energy_core::permutation::identity(n);
        let statistic = multi_sample_statistic(distances, &groups, &identity, self.estimator);
        if !statistic.is_finite() {
            warn!("observed energy statistic is not finite ({})", statistic);
        }

        let mut replicates = try_buffer::<f64>(self.replicates, "replicate")?;
        (0..self.replicates)
            .into_par_iter()
            .map_init(
                || vec![0usize; n],
                |perm, b| {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    rng.set_stream(b as u64);
                    rng.permute(perm);
                    multi_sample_statistic(distances, &groups, perm, self.estimator)
                },
            )
            .collect_into_vec(&mut replicates);
        let n_exceeding = replicates.par_iter().filter(|&&e| statistic < e).count();

        Ok(self.finish(statistic, replicates, n_exceeding, &groups))
    }

    fn finish(
        &self,
        statistic: f64,
        replicates: Vec<f64>,
        n_exceeding: usize,
        groups: &GroupIndex,
    ) -> EnergyTestResult {
        let r = replicates.len();
        let p_value = (r > 0).then(|| (n_exceeding as f64 + 1.0) / (r as f64 + 1.0));
        debug!(
            "energy test done: statistic={}, exceeding={}/{}, p={:?}",
            statistic, n_exceeding, r, p_value
        );
        EnergyTestResult {
            statistic,
            replicates,
            p_value,
            n_exceeding,
            sizes: groups.sizes().to_vec(),
            estimator: self.estimator,
            method: format!("{}-sample E-test of equal distributions", groups.n_groups()),
        }
    }
}

/// Energy test from a flat buffer.
///
/// `buffer` holds `N = Σ sizes` pooled observations in `layout` order: an
/// `N × dim` sample matrix, or, when `dim == 0`, an `N × N` distance matrix
/// that is used as given. All configuration is validated before the
/// distance matrix is allocated.
///
/// # Errors
///
/// Returns an error if fewer than 2 groups are given, any group is empty,
/// `replicates` is negative, or the buffer length does not match the shape.
pub fn ksample_etest<S>(
    buffer: &[f64],
    layout: Layout,
    sizes: &[usize],
    dim: usize,
    replicates: i64,
    estimator: Estimator,
    source: &mut S,
) -> Result<EnergyTestResult>
where
    S: PermutationSource + ?Sized,
{
    let groups = GroupIndex::new(sizes)?;
    let replicates = usize::try_from(replicates).map_err(|_| {
        EnergyError::InvalidInput(format!(
            "replicates must be non-negative, got {}",
            replicates
        ))
    })?;
    let n = groups.total();
    let cols = if dim == 0 { n } else { dim };
    let expected = n.checked_mul(cols).ok_or_else(|| {
        EnergyError::Allocation(format!("{}x{} buffer overflows usize", n, cols))
    })?;
    if buffer.len() != expected {
        return Err(EnergyError::DimensionMismatch {
            expected,
            actual: buffer.len(),
        });
    }

    let distances = DistanceMatrix::from_buffer(buffer, n, dim, layout)?;
    EnergyTest::new()
        .replicates(replicates)
        .estimator(estimator)
        .run_with_groups(&distances, &groups, source)
}

fn check_total(groups: &GroupIndex, n: usize) -> Result<()> {
    if groups.total() != n {
        return Err(EnergyError::InvalidInput(format!(
            "group sizes sum to {}, but the pooled sample has {} observations",
            groups.total(),
            n
        )));
    }
    Ok(())
}

fn try_buffer<T>(len: usize, what: &str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|e| EnergyError::Allocation(format!("{} buffer of {}: {}", what, len, e)))?;
    Ok(v)
}
