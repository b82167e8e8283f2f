//! Command implementations for stack-doctor
//!
//! Every handler returns the process exit code for its results; errors are
//! reserved for failures of the tooling itself.

pub mod certs;
pub mod env;
pub mod images;
pub mod lifecycle;
pub mod status;
pub mod test;

pub use certs::{run_certs_generate, run_certs_inspect};
pub use env::{env_report, run_env_check};
pub use images::run_images_build;
pub use lifecycle::{run_down, run_up};
pub use status::run_status;
pub use test::run_test;

use crate::cli::Cli;
use crate::config::{self, Environment, Settings};
use crate::exec::{CommandRunner, SystemRunner};
use crate::models::{RunExit, RunSummary};
use crate::output::{print_json, print_run_report};
use std::path::PathBuf;
use std::sync::Arc;

/// How results are shown
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
}

impl OutputMode {
    /// Human readable output on stdout
    pub fn text(&self) -> bool {
        !self.json && !self.quiet
    }

    /// Progress bars only make sense on an interactive terminal
    pub fn progress(&self) -> bool {
        self.text() && console::Term::stdout().is_term()
    }
}

/// Loaded configuration shared by every command
pub struct App {
    pub settings: Arc<Settings>,
    pub env: Arc<Environment>,
    pub env_file: PathBuf,
    pub runner: Arc<dyn CommandRunner>,
    pub output: OutputMode,
}

impl App {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let (settings, env) = config::load_config(cli.config.as_deref(), cli.env_file.as_deref())?;
        let env_file = cli
            .env_file
            .clone()
            .unwrap_or_else(|| settings.compose.env_file.clone());

        Ok(Self {
            settings: Arc::new(settings),
            env: Arc::new(env),
            env_file,
            runner: Arc::new(SystemRunner::new()),
            output: OutputMode {
                json: cli.json,
                quiet: cli.quiet,
            },
        })
    }
}

/// Print a summary in the selected mode and return its exit code
pub fn finish(output: OutputMode, summary: &RunSummary) -> anyhow::Result<RunExit> {
    if output.json {
        print_json(summary)?;
    } else if output.text() {
        print_run_report(summary);
    }
    Ok(summary.exit_code())
}
