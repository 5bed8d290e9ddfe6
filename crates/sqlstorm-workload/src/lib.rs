//! The concurrent workload engine: operation selection, per-thread
//! execution loops, bulk load, grammar SQL, dual-engine comparison, and run
//! setup.

pub mod bulkload;
pub mod compare;
pub mod ddl;
pub mod error;
pub mod exec;
pub mod grammar;
pub mod logging;
pub mod selector;
pub mod setup;
pub mod state;
pub mod worker;

pub use error::{Result, WorkloadError};
pub use selector::Selector;
pub use state::{NodeCounters, RunState};
pub use worker::Worker;
