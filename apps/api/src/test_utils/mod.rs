//! Test utilities.
//!
//! This module provides:
//! - Test data factories for webhook payloads and provider objects
//! - In-memory repository implementations for mocking persistence
//! - `TestAppStateBuilder` for exercising the HTTP router

mod app_state_builder;
mod billing_mocks;

pub use app_state_builder::*;
pub use billing_mocks::*;
pub use factories::*;
