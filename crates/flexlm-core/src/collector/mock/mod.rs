//! Mock `lmutil` runner and canned `lmstat` reports for testing.
//!
//! Lets the poller and the exporter be exercised without a license server.

mod runner;
pub mod scenarios;

pub use runner::{MockResponse, MockRunner};
