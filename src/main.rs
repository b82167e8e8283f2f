//! Stack Doctor - checks for the local Docker Compose backend stack
//!
//! This tool provides functionality for:
//! - Functional tests against every service in the stack
//! - Container status and lifecycle
//! - Certificate generation and inspection
//! - Image build and push
//! - Environment file checks

use clap::Parser;
use console::style;
use stack_doctor::cli::{CertsAction, Cli, Commands, EnvAction, ImagesAction};
use stack_doctor::commands::{self, App};
use stack_doctor::models::RunExit;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let default_filter = if cli.verbose { "stack_doctor=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(exit) => std::process::exit(exit.code()),
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(RunExit::Failure.code());
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<RunExit> {
    let app = App::load(cli)?;

    match &cli.command {
        Commands::Test(args) => commands::run_test(&app, args).await,
        Commands::Status(args) => commands::run_status(&app, args).await,
        Commands::Up(args) => commands::run_up(&app, args).await,
        Commands::Down(args) => commands::run_down(&app, args).await,
        Commands::Certs { action } => match action {
            CertsAction::Generate(args) => commands::run_certs_generate(&app, args).await,
            CertsAction::Inspect(args) => commands::run_certs_inspect(&app, args).await,
        },
        Commands::Images { action } => match action {
            ImagesAction::Build(args) => commands::run_images_build(&app, args).await,
        },
        Commands::Env { action } => match action {
            EnvAction::Check => commands::run_env_check(&app).await,
        },
    }
}
