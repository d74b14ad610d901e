//! Page log test suite

mod recovery_tests;
