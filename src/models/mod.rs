//! Data models for stack-doctor
//!
//! This module contains the result records produced by a run: individual
//! check outcomes, per-service reports and the aggregated summary.

pub mod service;
pub mod summary;
pub mod test_result;

pub use service::ServiceKind;
pub use summary::{RunExit, RunSummary, ServiceReport, Tally};
pub use test_result::{CheckCategory, CheckOutcome, CheckStatus};
