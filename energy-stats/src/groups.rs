//! Group bookkeeping over a pooled index space.
//!
//! Group `k` occupies positions `offset(k)..offset(k) + size(k)` of whatever
//! index array is active, identity or permuted. The offsets only depend on
//! the sizes, so they are computed once per test.

use energy_core::{EnergyError, Result};

/// Sizes and starting offsets of `K` groups within a pooled sample.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupIndex {
    sizes: Vec<usize>,
    offsets: Vec<usize>,
    total: usize,
}

impl GroupIndex {
    /// Compute offsets for the given group sizes.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 2 groups are given, if any group is
    /// empty, or if the total size overflows.
    pub fn new(sizes: &[usize]) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(EnergyError::InvalidInput(format!(
                "at least 2 groups required, got {}",
                sizes.len()
            )));
        }
        if let Some(k) = sizes.iter().position(|&s| s < 1) {
            return Err(EnergyError::InvalidInput(format!(
                "group {} is empty; every group needs at least 1 observation",
                k
            )));
        }

        let mut offsets = Vec::with_capacity(sizes.len());
        let mut total = 0usize;
        for &s in sizes {
            offsets.push(total);
            total = total.checked_add(s).ok_or_else(|| {
                EnergyError::InvalidInput("sum of group sizes overflows usize".into())
            })?;
        }

        Ok(Self {
            sizes: sizes.to_vec(),
            offsets,
            total,
        })
    }

    /// Number of groups `K`.
    pub fn n_groups(&self) -> usize {
        self.sizes.len()
    }

    /// Pooled sample size `N`, the sum of all group sizes.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Group sizes in pooled order.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Starting position of every group.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Size of group `k`.
    pub fn size(&self, k: usize) -> usize {
        self.sizes[k]
    }

    /// Starting position of group `k`.
    pub fn offset(&self, k: usize) -> usize {
        self.offsets[k]
    }

    /// The indices of group `k` under `perm`.
    #[inline]
    pub fn slice<'a>(&self, perm: &'a [usize], k: usize) -> &'a [usize] {
        let start = self.offsets[k];
        &perm[start..start + self.sizes[k]]
    }

    /// Every unordered group pair `(i, j)` with `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let k = self.n_groups();
        (0..k).flat_map(move |i| ((i + 1)..k).map(move |j| (i, j)))
    }
}
