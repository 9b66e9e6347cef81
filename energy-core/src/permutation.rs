//! Index permutations and the injectable source that draws them.
//!
//! A permutation test owns one `Vec<usize>` for its whole run and asks a
//! [`PermutationSource`] to overwrite it before every replicate. Any
//! [`rand::Rng`] is a source, so callers choose (and seed) the generator:
//!
//! ```
//! use energy_core::permutation::{is_permutation, PermutationSource};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut perm = vec![0usize; 10];
//! rng.permute(&mut perm);
//! assert!(is_permutation(&perm));
//! ```

use rand::seq::SliceRandom;
use rand::Rng;

/// Capability to draw a uniformly random permutation of `0..n`.
pub trait PermutationSource {
    /// Overwrite `perm` with a permutation of `0..perm.len()`, every one of
    /// the `n!` orderings equally likely.
    ///
    /// The previous contents of `perm` must not influence the result.
    fn permute(&mut self, perm: &mut [usize]);
}

impl<R: Rng + ?Sized> PermutationSource for R {
    fn permute(&mut self, perm: &mut [usize]) {
        fill_identity(perm);
        // Fisher-Yates
        perm.shuffle(self);
    }
}

/// Reset `perm` to the identity `0, 1, …, n-1`.
pub fn fill_identity(perm: &mut [usize]) {
    for (i, p) in perm.iter_mut().enumerate() {
        *p = i;
    }
}

/// The identity permutation of length `n`.
pub fn identity(n: usize) -> Vec<usize> {
    (0..n).collect()
}

/// Whether `perm` contains every index in `0..perm.len()` exactly once.
pub fn is_permutation(perm: &[usize]) -> bool {
    let mut seen = vec![false; perm.len()];
    for &p in perm {
        match seen.get_mut(p) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
