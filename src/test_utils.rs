//! Shared fixtures and helpers for the test suites.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
