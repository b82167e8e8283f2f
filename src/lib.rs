//! Stack Doctor Library
//!
//! Health and functional checks for a local Docker Compose backend stack:
//! - Functional testers for Elasticsearch, Kibana, MongoDB, Kafka, Zookeeper
//!   and SQL Server
//! - Compose lifecycle and container health
//! - Local CA and service certificate generation and inspection
//! - Service image build and push
//!
//! # Usage
//!
//! ```rust,ignore
//! use stack_doctor::config::load_config;
//! use stack_doctor::exec::SystemRunner;
//! use stack_doctor::runner::{run_all, select_services, RunConfig};
//! use stack_doctor::services::{testers_for, TestContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (settings, env) = load_config(None, None)?;
//!     let services = select_services(&[], &[])?;
//!     let config = RunConfig::new(services, &settings);
//!     let ctx = TestContext::new(
//!         Arc::new(SystemRunner::new()),
//!         Arc::new(settings),
//!         Arc::new(env),
//!         false,
//!     )?;
//!     let summary = run_all(&ctx, &config, testers_for(&config.services), &|_| {}).await;
//!     println!("{:?}", summary.exit_code());
//!     Ok(())
//! }
//! ```

pub mod certs;
pub mod cli;
pub mod commands;
pub mod compose;
pub mod config;
pub mod exec;
pub mod images;
pub mod models;
pub mod output;
pub mod runner;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use cli::Cli;
pub use config::{Environment, Settings};
pub use models::{CheckOutcome, CheckStatus, RunExit, RunSummary, ServiceKind, ServiceReport};
pub use utils::{CertError, ComposeError, ConfigError, ExecError, ImageError};
