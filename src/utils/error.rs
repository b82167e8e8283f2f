//! Custom error types for stack-doctor
//!
//! This module defines domain-specific error types using `thiserror` for
//! the failure modes of the tooling itself. Failures of the services under
//! test are not errors here: they become `CheckOutcome`s.

use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Failed to read environment file {path}: {message}")]
    EnvFile { path: String, message: String },
}

/// External tool invocation errors
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("IO error while running {program}: {message}")]
    Io { program: String, message: String },
}

/// Docker Compose errors
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("docker-compose {action} failed: {message}")]
    CommandFailed { action: String, message: String },

    #[error("Failed to parse docker-compose ps output: {message}")]
    ParseError { message: String },

    #[error("Services not healthy after {secs}s: {services}")]
    NotHealthy { secs: u64, services: String },

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Certificate generation and inspection errors
#[derive(Error, Debug)]
pub enum CertError {
    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("Failed to parse certificate {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    WriteError { path: String, message: String },

    #[error("Missing keystore password: set {key}")]
    MissingPassword { key: String },
}

/// Image build and push errors
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Build context not found for {service}: {path}")]
    ContextNotFound { service: String, path: String },

    #[error("docker login to {registry} failed: {message}")]
    LoginFailed { registry: String, message: String },

    #[error(transparent)]
    Exec(#[from] ExecError),
}
