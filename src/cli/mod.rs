//! Command-line interface module
//!
//! This module handles CLI argument parsing using Clap.

pub mod args;

pub use args::{
    CertsAction, CertsGenerateArgs, CertsInspectArgs, Cli, Commands, DownArgs, EnvAction,
    ImagesAction, ImagesBuildArgs, StatusArgs, TestArgs, UpArgs,
};
