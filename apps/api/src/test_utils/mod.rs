//! Test utilities for integration testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - Helper builders for constructing use case instances with test dependencies

mod app_state_builder;
mod factories;
mod in_memory;
mod mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use in_memory::*;
pub use mocks::*;
