//! Engine test suite

mod cluster_tests;
mod lifecycle_tests;
