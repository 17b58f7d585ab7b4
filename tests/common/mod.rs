//! Shared helpers for integration tests

pub mod fixtures;
pub mod memory_store;
pub mod mock_platform;
