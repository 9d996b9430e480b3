//! # Cascade Testing Utils
//!
//! Shared testing utilities for the cascading consultation pipeline.
//! This crate provides mock implementations and test data builders that
//! can be used across all other crates in the workspace.
//!
//! ## Features
//!
//! - **Mock Extraction Agent**: scripted per-tier responses with call recording
//! - **Mock Audit Store**: in-memory recording sink with optional injected failure
//! - **Test Data Builders**: utilities for creating requests, findings, and addresses
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! cascade-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! Then use the mocks in your tests:
//!
//! ```rust
//! use cascade_testing_utils::mocks::*;
//! use cascade_testing_utils::builders::*;
//! ```

pub mod builders;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use mocks::*;
