//! Wire protocol test suite
