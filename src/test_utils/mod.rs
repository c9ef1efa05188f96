//! Shared test utilities for unit tests.

pub mod fixtures;
pub mod keys;
