//! License server status collection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Poller                           │
//! │  ┌────────────────────┐        ┌──────────────────────┐  │
//! │  │   LmutilRunner     │ stdout │   parse_lmstat       │  │
//! │  │  lmstat -a -c p@h  ├───────►│   text -> Snapshot   │  │
//! │  └─────────┬──────────┘        └──────────────────────┘  │
//! └────────────┼─────────────────────────────────────────────┘
//!              │ (trait)
//!       ┌──────┴────────┐
//!       │               │
//! ┌─────▼───────┐ ┌─────▼───────┐
//! │ProcessRunner│ │ MockRunner  │
//! │(tokio child)│ │ (Testing)   │
//! └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use flexlm_core::collector::{mock::scenarios, parse_lmstat};
//!
//! let snapshot = parse_lmstat(scenarios::TYPICAL_REPORT);
//! assert!(snapshot.server_up);
//! assert_eq!(snapshot.features.len(), 2);
//! ```

pub mod command;
pub mod lmstat;
pub mod mock;

pub use command::{
    CommandError, CommandOutput, DEFAULT_COMMAND_TIMEOUT, LmutilRunner, ProcessRunner, lmstat_args,
};
pub use lmstat::parse_lmstat;
pub use mock::{MockResponse, MockRunner};
