// See <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

pub mod eviction;
pub mod expiration;
pub mod failures;
pub mod single_flight;
pub mod sweeper;
pub mod utils;

pub use utils::*;
