pub mod adapters;
pub mod application;
pub mod domain;
pub mod infra;

// In-memory repositories and builders for unit and route tests.
#[cfg(test)]
pub mod test_utils;

// Re-exports for shorter use statements.
pub use application::*;
pub use domain::*;
