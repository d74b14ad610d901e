//! File system driver test suite

mod durable_tests;
