//! External process execution
//!
//! Wraps `tokio::process` behind the `CommandRunner` trait, with timeouts,
//! fixed-delay retry and error-text classification.

pub mod classify;
pub mod command;
pub mod retry;

pub use classify::{classify, ErrorKind};
pub use command::{docker_exec, CommandRunner, SystemRunner, ToolInvocation, ToolOutput};
pub use retry::{retry, Retried, RetryPolicy};
