//! # tessera-vm-tests
//!
//! JSON fixture runner for the Tessera VM.
//!
//! This crate provides:
//! - JSON parsing for chain fixtures (scripts, budget, expected outcome)
//! - A runner that executes each fixture against a fresh in-memory snapshot
//! - Result aggregation and reporting
//!
//! ## Fixture format
//!
//! A fixture file is a JSON object mapping test names to fixtures:
//!
//! ```json
//! {
//!   "add": {
//!     "scripts": ["1213", "9e"],
//!     "gas": 1000,
//!     "expected": { "state": "HALT", "gas_consumed": 260 }
//!   }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod runner;
mod types;

pub use error::{TestError, TestResult};
pub use runner::{FixtureResults, FixtureRunner, TestStats};
pub use types::*;
