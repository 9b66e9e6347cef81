//! Energy statistics for testing equality of multivariate distributions.
//!
//! - **Distances** — [`DistanceMatrix`] over a pooled sample, or a precomputed one
//! - **Groups** — [`GroupIndex`], group offsets within a pooled index permutation
//! - **Statistics** — two-sample and k-sample E-statistics, pairwise E-distance tables
//! - **Permutation test** — [`EnergyTest`] and the flat-buffer entry point [`ksample_etest`]

pub mod distance;
pub mod etest;
pub mod groups;
pub mod statistic;

pub use distance::DistanceMatrix;
pub use etest::{ksample_etest, EnergyTest, EnergyTestResult};
pub use groups::GroupIndex;
pub use statistic::{
    multi_sample_statistic, pairwise_edistances, two_sample_statistic,
    two_sample_statistic_direct, EDistanceTable, Estimator,
};
