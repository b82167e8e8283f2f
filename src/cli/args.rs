//! CLI argument definitions using clap

use crate::models::ServiceKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stack-doctor")]
#[command(version)]
#[command(
    about = "Health and functional checks for the local Docker Compose backend stack",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (default: config/default.toml when present)
    #[arg(short, long, global = true, env = "STACK_DOCTOR_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Environment file shared with docker-compose
    #[arg(long, global = true, env = "STACK_DOCTOR_ENV_FILE", value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output (exit code only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run functional tests against the running stack
    Test(TestArgs),

    /// Show container state and health
    Status(StatusArgs),

    /// Start the stack (docker-compose up -d)
    Up(UpArgs),

    /// Stop the stack
    Down(DownArgs),

    /// Generate or inspect TLS certificates
    Certs {
        #[command(subcommand)]
        action: CertsAction,
    },

    /// Build and push service images
    Images {
        #[command(subcommand)]
        action: ImagesAction,
    },

    /// Check the environment file
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Only test these services
    #[arg(long, value_enum, value_delimiter = ',', value_name = "SERVICES")]
    pub include_services: Vec<ServiceKind>,

    /// Skip these services
    #[arg(long, value_enum, value_delimiter = ',', value_name = "SERVICES")]
    pub exclude_services: Vec<ServiceKind>,

    /// Test services concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Maximum services tested at once with --parallel
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_parallel: Option<u16>,

    /// Per-service timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Keep the indices, topics, tables and collections created by the run
    #[arg(long)]
    pub skip_cleanup: bool,

    /// Check container state before testing
    #[arg(long)]
    pub preflight: bool,

    /// Write the JSON report to a file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Wait up to this many seconds for every container to become healthy
    #[arg(long, value_name = "SECS")]
    pub wait: Option<u64>,

    /// Only these services
    #[arg(long, value_enum, value_delimiter = ',', value_name = "SERVICES")]
    pub services: Vec<ServiceKind>,
}

#[derive(Args, Debug)]
pub struct UpArgs {
    /// After starting, wait up to this many seconds for healthy containers
    #[arg(long, value_name = "SECS")]
    pub wait: Option<u64>,
}

#[derive(Args, Debug)]
pub struct DownArgs {
    /// Also remove named volumes
    #[arg(long)]
    pub volumes: bool,
}

#[derive(Subcommand, Debug)]
pub enum CertsAction {
    /// Generate the CA and per-service certificates
    Generate(CertsGenerateArgs),

    /// Show validity and SANs of generated certificates
    Inspect(CertsInspectArgs),
}

#[derive(Args, Debug)]
pub struct CertsGenerateArgs {
    /// Regenerate artifacts that already exist
    #[arg(long)]
    pub force: bool,

    /// Print the plan without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Services to issue certificates for (default: from settings)
    #[arg(long, value_enum, value_delimiter = ',', value_name = "SERVICES")]
    pub services: Vec<ServiceKind>,

    /// Output directory (default: from settings)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CertsInspectArgs {
    /// Directory to scan for *.crt files (default: from settings)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ImagesAction {
    /// Build service images, optionally pushing them
    Build(ImagesBuildArgs),
}

#[derive(Args, Debug)]
pub struct ImagesBuildArgs {
    /// Registry prefix, e.g. registry.example.com/team
    #[arg(long, value_name = "PREFIX")]
    pub registry_prefix: Option<String>,

    /// Image tag
    #[arg(long, value_name = "TAG")]
    pub image_tag: Option<String>,

    /// Push after building
    #[arg(long)]
    pub push_images: bool,

    /// Only build these services
    #[arg(long, value_enum, value_delimiter = ',', value_name = "SERVICES")]
    pub include_services: Vec<ServiceKind>,
}

#[derive(Subcommand, Debug)]
pub enum EnvAction {
    /// Report which variables are set (values are never printed)
    Check,
}
