#![deny(dead_code)]
#![deny(unused_imports)]

pub mod aggregate;
pub mod estimate;
pub mod kld;
pub mod linalg;
pub mod model;
pub mod precision;
pub mod progress;
pub mod reduce;

#[path = "../shared/files.rs"]
pub mod shared_files;
pub mod shared {
    pub use super::shared_files as files;
}

#[cfg(test)]
pub mod test_fixtures;

pub use estimate::{RateError, RateInput, rate, rate_with_progress};
pub use model::{RankDiagnostics, RateConfig, RateMode, RateResult};
