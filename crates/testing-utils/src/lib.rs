//! # Fleet Testing Utils
//!
//! Shared testing utilities for the fleet reminder workspace: in-memory
//! repository mocks, entity builders and helpers for an in-memory SQLite
//! database.
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! fleet-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use helpers::*;
pub use mocks::*;
