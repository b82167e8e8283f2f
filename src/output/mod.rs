//! Output formatting module
//!
//! Provides the output formats:
//! - Rich terminal output with colors and tables
//! - JSON export

pub mod json;
pub mod tables;
pub mod terminal;

pub use json::{print_json, write_json_file};
pub use tables::{format_table, print_table};
pub use terminal::{
    format_duration, overall_line, print_cert_summaries, print_header, print_run_report,
    print_service_report, print_summary, service_line, styled_status,
};
