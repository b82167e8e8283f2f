//! Utility modules for stack-doctor
//!
//! This module contains error types, progress indicators, and other utilities.

pub mod error;
pub mod progress;

pub use error::{CertError, ComposeError, ConfigError, ExecError, ImageError};
pub use progress::{
    create_spinner, print_info, print_pass, print_warning, ProgressTracker,
};
