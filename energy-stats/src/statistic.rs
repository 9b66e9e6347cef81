//! Energy-distance (E-statistic) kernels.
//!
//! For samples `X` (size m) and `Y` (size n) drawn from a distance matrix `D`:
//!
//! ```text
//! E(X, Y) = m·n / (m + n) · (2·mean D[X,Y] − mean D[X,X'] − mean D[Y,Y'])
//! ```
//!
//! where the within-sample means sum each unordered pair once and divide by
//! `m²/2` ([`Estimator::Biased`]) or `m(m−1)/2` ([`Estimator::Unbiased`]).
//! The k-sample statistic is the sum of `E` over every pair of groups.
//!
//! The kernels read `D` and the index slices only; they never allocate, so
//! they can be called once per group pair per permutation replicate.

use energy_core::{EnergyError, Matrix, Result, Summarizable};

use crate::distance::{powered_distance, DistanceMatrix};
use crate::groups::GroupIndex;

/// Normalization of the within-sample distance means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Estimator {
    /// Plug-in estimator: pair sums divided by `m²/2`.
    #[default]
    Biased,
    /// Small-sample corrected: pair sums divided by `m(m−1)/2`.
    ///
    /// Undefined for singleton groups; the division by zero is not caught and
    /// the statistic comes out non-finite.
    Unbiased,
}

impl Estimator {
    /// Whether the small-sample correction is applied.
    pub fn is_unbiased(self) -> bool {
        self == Estimator::Unbiased
    }
}

impl From<bool> for Estimator {
    fn from(unbiased: bool) -> Self {
        if unbiased {
            Estimator::Unbiased
        } else {
            Estimator::Biased
        }
    }
}

/// Two-sample energy statistic between the observations indexed by `x` and `y`.
///
/// Returns 0.0 when either index list is empty.
pub fn two_sample_statistic(
    distances: &DistanceMatrix,
    x: &[usize],
    y: &[usize],
    estimator: Estimator,
) -> f64 {
    let m = x.len();
    let n = y.len();
    if m < 1 || n < 1 {
        return 0.0;
    }
    let m_f = m as f64;
    let n_f = n as f64;

    let mut sumxx = within_pair_sum(distances, x) * (2.0 / (m_f * m_f));
    let mut sumyy = within_pair_sum(distances, y) * (2.0 / (n_f * n_f));
    if estimator.is_unbiased() {
        sumxx *= m_f / (m_f - 1.0);
        sumyy *= n_f / (n_f - 1.0);
    }

    let mut sumxy = 0.0;
    for &i in x {
        for &j in y {
            sumxy += distances.get(i, j);
        }
    }
    sumxy /= m_f * n_f;

    (m_f * n_f) / (m_f + n_f) * (2.0 * sumxy - sumxx - sumyy)
}

/// K-sample energy statistic: [`two_sample_statistic`] summed over all
/// `K(K−1)/2` group pairs, group `k` being `groups.slice(perm, k)`.
///
/// `perm` must have length `groups.total()`; with the identity permutation
/// this is the observed statistic.
pub fn multi_sample_statistic(
    distances: &DistanceMatrix,
    groups: &GroupIndex,
    perm: &[usize],
    estimator: Estimator,
) -> f64 {
    debug_assert_eq!(perm.len(), groups.total());
    groups
        .pairs()
        .map(|(i, j)| {
            two_sample_statistic(
                distances,
                groups.slice(perm, i),
                groups.slice(perm, j),
                estimator,
            )
        })
        .sum()
}

/// Sum of `D[i][j]` over unordered pairs within `idx`.
#[inline]
fn within_pair_sum(distances: &DistanceMatrix, idx: &[usize]) -> f64 {
    let mut sum = 0.0;
    for (a, &i) in idx.iter().enumerate() {
        for &j in &idx[a + 1..] {
            sum += distances.get(i, j);
        }
    }
    sum
}

// ── Direct two-sample statistic ─────────────────────────────────────────────

/// Biased two-sample statistic for rows `0..m` against rows `m..m+n` of
/// `samples`, computing Euclidean distances on the fly instead of storing
/// an `N × N` matrix.
///
/// # Errors
///
/// Returns an error if either sample is empty or `m + n` differs from the
/// number of rows.
pub fn two_sample_statistic_direct(samples: &Matrix, m: usize, n: usize) -> Result<f64> {
    if m < 1 || n < 1 {
        return Err(EnergyError::InvalidInput(
            "two_sample_statistic_direct: both samples need at least 1 observation".into(),
        ));
    }
    if m.checked_add(n) != Some(samples.rows()) {
        return Err(EnergyError::InvalidInput(format!(
            "two_sample_statistic_direct: sizes {} + {} != {} rows",
            m,
            n,
            samples.rows()
        )));
    }
    let dist = |i: usize, j: usize| powered_distance(samples.row(i), samples.row(j), 1.0);
    let m_f = m as f64;
    let n_f = n as f64;

    let mut sumxy = 0.0;
    for i in 0..m {
        for j in m..m + n {
            sumxy += dist(i, j);
        }
    }
    sumxy /= m_f * n_f;

    let mut sumxx = 0.0;
    for i in 0..m {
        for j in (i + 1)..m {
            sumxx += dist(i, j);
        }
    }
    sumxx *= 2.0 / (m_f * m_f);

    let mut sumyy = 0.0;
    for i in m..m + n {
        for j in (i + 1)..m + n {
            sumyy += dist(i, j);
        }
    }
    sumyy *= 2.0 / (n_f * n_f);

    Ok((m_f * n_f) / (m_f + n_f) * (2.0 * sumxy - sumxx - sumyy))
}

// ── Pairwise E-distances between groups ─────────────────────────────────────

/// Symmetric `K × K` table of two-sample energy statistics between groups.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EDistanceTable {
    values: Vec<f64>,
    k: usize,
}

impl EDistanceTable {
    /// E-statistic between groups `i` and `j` (0.0 on the diagonal).
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.k + j]
    }

    /// Number of groups.
    pub fn n_groups(&self) -> usize {
        self.k
    }

    /// Sum over the upper triangle, equal to the k-sample statistic.
    pub fn total(&self) -> f64 {
        let mut sum = 0.0;
        for i in 0..self.k {
            for j in (i + 1)..self.k {
                sum += self.get(i, j);
            }
        }
        sum
    }
}

impl Summarizable for EDistanceTable {
    fn summary(&self) -> String {
        format!("EDistanceTable: {} groups, total={:.4}", self.k, self.total())
    }
}

/// Two-sample energy statistics between every pair of groups, taken in
/// pooled order.
///
/// # Errors
///
/// Returns an error if the group sizes do not add up to the matrix size.
pub fn pairwise_edistances(
    distances: &DistanceMatrix,
    groups: &GroupIndex,
    estimator: Estimator,
) -> Result<EDistanceTable> {
    if groups.total() != distances.n() {
        return Err(EnergyError::InvalidInput(format!(
            "pairwise_edistances: group sizes sum to {}, distance matrix is {}x{}",
            groups.total(),
            distances.n(),
            distances.n()
        )));
    }
    let k = groups.n_groups();
    let perm = energy_core::permutation::identity(groups.total());
    let mut values = vec![0.0; k * k];
    for (i, j) in groups.pairs() {
        let e = two_sample_statistic(
            distances,
            groups.slice(&perm, i),
            groups.slice(&perm, j),
            estimator,
        );
        values[i * k + j] = e;
        values[j * k + i] = e;
    }
    Ok(EDistanceTable { values, k })
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_core::permutation::identity;

    fn line(values: &[f64]) -> DistanceMatrix {
        let rows: Vec<Vec<f64>> = values.iter().map(|&v| vec![v]).collect();
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        DistanceMatrix::from_samples(&Matrix::from_rows(&refs).unwrap()).unwrap()
    }

    #[test]
    fn separated_groups_known_value() {
        // A = {0, 1, 2}, B = {10, 11, 12}:
        // sumxy = 10, sumxx = sumyy = 8/9, E = 1.5 * (20 - 16/9) = 82/3.
        let dm = line(&[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        let e = two_sample_statistic(&dm, &[0, 1, 2], &[3, 4, 5], Estimator::Biased);
        assert!((e - 82.0 / 3.0).abs() < 1e-9, "E={}", e);
    }

    #[test]
    fn unbiased_known_value() {
        // Same data: sumxx = sumyy = 8/9 * 3/2 = 4/3, E = 1.5 * (20 - 8/3) = 26.
        let dm = line(&[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        let e = two_sample_statistic(&dm, &[0, 1, 2], &[3, 4, 5], Estimator::Unbiased);
        assert!((e - 26.0).abs() < 1e-9, "E={}", e);
    }

    #[test]
    fn swapping_samples_is_symmetric() {
        let dm = line(&[0.3, 1.7, -2.0, 5.5, 0.1, 9.0, 4.4]);
        let x = [0, 3, 5];
        let y = [1, 2, 4, 6];
        for est in [Estimator::Biased, Estimator::Unbiased] {
            let a = two_sample_statistic(&dm, &x, &y, est);
            let b = two_sample_statistic(&dm, &y, &x, est);
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_sample_is_zero() {
        let dm = line(&[0.0, 1.0]);
        assert_eq!(two_sample_statistic(&dm, &[], &[0, 1], Estimator::Biased), 0.0);
        assert_eq!(two_sample_statistic(&dm, &[0], &[], Estimator::Unbiased), 0.0);
    }

    #[test]
    fn singleton_biased_is_finite() {
        // A single observation has no within-sample pairs.
        let dm = line(&[0.0, 4.0, 6.0]);
        let e = two_sample_statistic(&dm, &[0], &[1, 2], Estimator::Biased);
        // sumxy = 5, sumyy = 2/4 * 2 = 1, E = 2/3 * (10 - 1) = 6.
        assert!((e - 6.0).abs() < 1e-12, "E={}", e);
    }

    #[test]
    fn singleton_unbiased_is_nan() {
        let dm = line(&[0.0, 4.0, 6.0]);
        let e = two_sample_statistic(&dm, &[0], &[1, 2], Estimator::Unbiased);
        assert!(!e.is_finite());
    }

    #[test]
    fn interleaved_samples_keep_sign() {
        // Interleaved samples from one process: the signed value is kept.
        let dm = line(&[0.0, 1.0, 2.0, 3.0]);
        let e = two_sample_statistic(&dm, &[0, 3], &[1, 2], Estimator::Biased);
        // sumxy = 1.5, sumxx = 1.5, sumyy = 0.5, E = 1 * (3 - 1.5 - 0.5) = 1.
        assert!((e - 1.0).abs() < 1e-12, "E={}", e);
        let e = two_sample_statistic(&dm, &[0, 2], &[1, 3], Estimator::Unbiased);
        // sumxy = 1.5, sumxx = sumyy = 2, E = 1 * (3 - 4) = -1.
        assert!((e + 1.0).abs() < 1e-12, "E={}", e);
    }

    #[test]
    fn two_groups_match_pairwise() {
        let dm = line(&[0.5, 2.0, 3.5, 7.0, 1.0, 8.0, 6.5]);
        let groups = GroupIndex::new(&[3, 4]).unwrap();
        let perm = identity(7);
        let multi = multi_sample_statistic(&dm, &groups, &perm, Estimator::Biased);
        let pair = two_sample_statistic(&dm, &[0, 1, 2], &[3, 4, 5, 6], Estimator::Biased);
        assert_eq!(multi, pair);
    }

    #[test]
    fn three_groups_sum_of_pairs() {
        let dm = line(&[0.0, 1.0, 5.0, 6.0, 20.0, 21.0, 22.0]);
        let groups = GroupIndex::new(&[2, 2, 3]).unwrap();
        let perm = identity(7);
        let total = multi_sample_statistic(&dm, &groups, &perm, Estimator::Unbiased);
        let expected = two_sample_statistic(&dm, &[0, 1], &[2, 3], Estimator::Unbiased)
            + two_sample_statistic(&dm, &[0, 1], &[4, 5, 6], Estimator::Unbiased)
            + two_sample_statistic(&dm, &[2, 3], &[4, 5, 6], Estimator::Unbiased);
        assert!((total - expected).abs() < 1e-12);
    }

    #[test]
    fn permuted_groups_read_through_perm() {
        let dm = line(&[0.0, 10.0, 1.0, 11.0]);
        let groups = GroupIndex::new(&[2, 2]).unwrap();
        // perm puts {0, 2} in group 0 and {1, 3} in group 1.
        let e = multi_sample_statistic(&dm, &groups, &[0, 2, 1, 3], Estimator::Biased);
        let direct = two_sample_statistic(&dm, &[0, 2], &[1, 3], Estimator::Biased);
        assert_eq!(e, direct);
    }

    #[test]
    fn direct_matches_distance_matrix() {
        let rows = [[0.0, 1.0], [2.0, -1.0], [0.5, 0.5], [4.0, 4.0], [3.0, 5.0]];
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let samples = Matrix::from_rows(&refs).unwrap();
        let dm = DistanceMatrix::from_samples(&samples).unwrap();
        let via_matrix = two_sample_statistic(&dm, &[0, 1, 2], &[3, 4], Estimator::Biased);
        let direct = two_sample_statistic_direct(&samples, 3, 2).unwrap();
        assert!((via_matrix - direct).abs() < 1e-9);
    }

    #[test]
    fn direct_size_errors() {
        let samples = Matrix::from_rows(&[&[0.0], &[1.0], &[2.0]]).unwrap();
        assert!(two_sample_statistic_direct(&samples, 0, 3).is_err());
        assert!(two_sample_statistic_direct(&samples, 2, 2).is_err());
    }

    #[test]
    fn edistance_table_totals_to_k_sample() {
        let dm = line(&[0.0, 1.0, 5.0, 6.0, 20.0, 21.0, 22.0]);
        let groups = GroupIndex::new(&[2, 2, 3]).unwrap();
        let table = pairwise_edistances(&dm, &groups, Estimator::Biased).unwrap();
        assert_eq!(table.n_groups(), 3);
        assert_eq!(table.get(1, 1), 0.0);
        assert_eq!(table.get(0, 2), table.get(2, 0));
        let k_sample = multi_sample_statistic(&dm, &groups, &identity(7), Estimator::Biased);
        assert!((table.total() - k_sample).abs() < 1e-9);
        assert!(table.summary().starts_with("EDistanceTable: 3 groups"));
    }

    #[test]
    fn edistance_table_size_mismatch() {
        let dm = line(&[0.0, 1.0, 2.0]);
        let groups = GroupIndex::new(&[2, 2]).unwrap();
        assert!(pairwise_edistances(&dm, &groups, Estimator::Biased).is_err());
    }

    #[test]
    fn estimator_from_flag() {
        assert_eq!(Estimator::from(true), Estimator::Unbiased);
        assert_eq!(Estimator::from(false), Estimator::Biased);
        assert_eq!(Estimator::default(), Estimator::Biased);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use energy_core::permutation::identity;
    use proptest::prelude::*;

    fn pooled(max_per_group: usize) -> impl Strategy<Value = (Vec<f64>, usize)> {
        (1..=max_per_group, 1..=max_per_group).prop_flat_map(|(m, n)| {
            (proptest::collection::vec(-100.0..100.0f64, m + n), Just(m))
        })
    }

    fn matrix_of(values: &[f64]) -> DistanceMatrix {
        let rows: Vec<Vec<f64>> = values.iter().map(|&v| vec![v]).collect();
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        DistanceMatrix::from_samples(&Matrix::from_rows(&refs).unwrap()).unwrap()
    }

    proptest! {
        #[test]
        fn swap_symmetry((values, m) in pooled(12)) {
            let dm = matrix_of(&values);
            let n = values.len() - m;
            let x: Vec<usize> = (0..m).collect();
            let y: Vec<usize> = (m..m + n).collect();
            let a = two_sample_statistic(&dm, &x, &y, Estimator::Biased);
            let b = two_sample_statistic(&dm, &y, &x, Estimator::Biased);
            prop_assert!((a - b).abs() <= 1e-9 * (1.0 + a.abs()));
        }

        #[test]
        fn k2_equals_pairwise((values, m) in pooled(12)) {
            let dm = matrix_of(&values);
            let n = values.len() - m;
            let groups = GroupIndex::new(&[m, n]).unwrap();
            let perm = identity(m + n);
            let x: Vec<usize> = (0..m).collect();
            let y: Vec<usize> = (m..m + n).collect();
            let multi = multi_sample_statistic(&dm, &groups, &perm, Estimator::Biased);
            let pair = two_sample_statistic(&dm, &x, &y, Estimator::Biased);
            prop_assert_eq!(multi, pair);
        }
    }
}
