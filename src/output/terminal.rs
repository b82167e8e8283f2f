//! Rich terminal output formatting

use super::tables::print_table;
use crate::certs::CertSummary;
use crate::models::{CheckStatus, RunSummary, ServiceReport, Tally};
use console::{style, StyledObject};

/// Print section header
pub fn print_header(title: &str) {
    println!();
    println!("{}", style(format!("━━━ {} ━━━", title)).cyan().bold());
    println!();
}

/// Human friendly duration: `850ms`, `4.2s`, `2m 03s`
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {:02}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

/// Status with its colour applied
pub fn styled_status(status: CheckStatus) -> StyledObject<String> {
    let text = status.to_string();
    match status {
        CheckStatus::Pass => style(text).green(),
        CheckStatus::Warning => style(text).yellow(),
        CheckStatus::Fail => style(text).red().bold(),
        CheckStatus::Skipped => style(text).dim(),
    }
}

/// One line per finished service, used while a run is in progress
pub fn service_line(name: &str, status: CheckStatus, tally: &Tally, duration_ms: u64) -> String {
    format!(
        "  {} {} ({}/{} checks passed, {})",
        styled_status(status),
        style(name).bold(),
        tally.passed + tally.warnings,
        tally.executed(),
        format_duration(duration_ms)
    )
}

/// Check table for one service
pub fn print_service_report(report: &ServiceReport) {
    print_header(&report.name);

    if let Some(error) = &report.error {
        println!("  {} {}", style("✗").red(), style(error).red());
        if report.checks.is_empty() {
            return;
        }
        println!();
    }

    let rows: Vec<Vec<String>> = report
        .checks
        .iter()
        .map(|check| {
            vec![
                check.name.clone(),
                check.category.to_string(),
                check.status.to_string(),
                format_duration(check.duration_ms),
                check.detail().to_string(),
            ]
        })
        .collect();

    print_table(&["Check", "Category", "Status", "Duration", "Detail"], &rows);
}

/// Service and category breakdowns followed by the overall line
pub fn print_summary(summary: &RunSummary) {
    print_header("Summary");

    let service_rows: Vec<Vec<String>> = summary
        .reports
        .iter()
        .map(|report| {
            let tally = report.tally();
            vec![
                report.name.clone(),
                report.status().to_string(),
                tally.passed.to_string(),
                tally.warnings.to_string(),
                tally.failed.to_string(),
                tally.skipped.to_string(),
                format_duration(report.duration_ms),
            ]
        })
        .collect();
    print_table(
        &["Service", "Status", "Passed", "Warnings", "Failed", "Skipped", "Duration"],
        &service_rows,
    );

    let by_category = summary.tally_by_category();
    if !by_category.is_empty() {
        println!();
        let category_rows: Vec<Vec<String>> = by_category
            .iter()
            .map(|(category, tally)| {
                vec![
                    category.to_string(),
                    tally.passed.to_string(),
                    tally.warnings.to_string(),
                    tally.failed.to_string(),
                    tally.skipped.to_string(),
                    format!("{:.0}%", tally.pass_rate()),
                ]
            })
            .collect();
        print_table(
            &["Category", "Passed", "Warnings", "Failed", "Skipped", "Pass rate"],
            &category_rows,
        );
    }

    println!();
    println!("  {}", overall_line(summary));
}

/// `✓ PASS  12 passed, 1 warning, 0 failed, 2 skipped (93%) in 41.3s`
pub fn overall_line(summary: &RunSummary) -> String {
    let tally = summary.tally();
    format!(
        "{}  {} passed, {} warning(s), {} failed, {} skipped ({:.0}%) in {}",
        styled_status(summary.overall_status()),
        tally.passed,
        tally.warnings,
        tally.failed,
        tally.skipped,
        tally.pass_rate(),
        format_duration(summary.duration_ms)
    )
}

/// Full terminal report
pub fn print_run_report(summary: &RunSummary) {
    for report in &summary.reports {
        print_service_report(report);
    }
    print_summary(summary);
}

/// Certificate details for `certs inspect`
pub fn print_cert_summaries(certs: &[CertSummary]) {
    print_header("Certificates");

    let rows: Vec<Vec<String>> = certs
        .iter()
        .map(|cert| {
            vec![
                cert.path.display().to_string(),
                cert.subject.clone(),
                cert.issuer.clone(),
                cert.subject_alt_names.join(", "),
                cert.not_after.format("%Y-%m-%d").to_string(),
                format!("{} {}", cert.status().icon(), cert.days_remaining),
                format_fingerprint(&cert.fingerprint_sha256),
            ]
        })
        .collect();

    print_table(
        &["File", "Subject", "Issuer", "SANs", "Expires", "Days", "SHA-256"],
        &rows,
    );
}

/// First bytes of a fingerprint, colon separated
fn format_fingerprint(hex: &str) -> String {
    let bytes: Vec<&str> = hex
        .as_bytes()
        .chunks(2)
        .take(8)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .collect();
    let mut out = bytes.join(":").to_uppercase();
    if hex.len() > 16 {
        out.push_str(":…");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(850), "850ms");
        assert_eq!(format_duration(4_200), "4.2s");
        assert_eq!(format_duration(123_000), "2m 03s");
    }

    #[test]
    fn test_format_fingerprint() {
        assert_eq!(
            format_fingerprint("039274ae4586df3085dc1fd2fa8a8db3"),
            "03:92:74:AE:45:86:DF:30:…"
        );
        assert_eq!(format_fingerprint("abcd"), "AB:CD");
    }
}
