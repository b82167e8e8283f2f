//! Progress display for test runs, certificate plans and long tool calls
//!
//! Everything here draws to the terminal only when asked to; JSON, quiet and
//! non-TTY output get hidden bars so callers never branch on the mode.

use crate::models::CheckStatus;
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Counts finished units (services, plan steps) and prints one line per unit
pub struct ProgressTracker {
    bar: ProgressBar,
}

impl ProgressTracker {
    pub fn new(total: usize, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Print `line` above the bar and count one unit as done
    pub fn complete_step(&self, line: &str) {
        self.bar.println(line);
        self.bar.inc(1);
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Spinner around a single long tool call (`compose up`, `docker build`)
pub fn create_spinner(message: &str, visible: bool) -> Option<ProgressBar> {
    if !visible {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Some(spinner)
}

fn print_marked(mark: StyledObject<&str>, message: &str) {
    println!("  {} {}", mark, message);
}

pub fn print_pass(message: &str) {
    print_marked(style(CheckStatus::Pass.icon()).green(), message);
}

pub fn print_warning(message: &str) {
    print_marked(style(CheckStatus::Warning.icon()).yellow(), message);
}

pub fn print_info(message: &str) {
    print_marked(style("ℹ").cyan(), message);
}
