//! Inspection of generated certificates

use crate::models::{CheckCategory, CheckOutcome, CheckStatus, ServiceReport};
use crate::utils::CertError;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use x509_parser::prelude::*;

/// Certificates closer to expiry than this are reported as warnings
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// Summary of one certificate file
#[derive(Debug, Clone, Serialize)]
pub struct CertSummary {
    pub path: PathBuf,
    pub subject: String,
    pub issuer: String,
    pub subject_alt_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Whole days until expiry, truncated; display only
    pub days_remaining: i64,
    /// `not_after` is in the past at inspection time
    pub expired: bool,
    pub is_ca: bool,
    pub fingerprint_sha256: String,
}

impl CertSummary {
    pub fn status(&self) -> CheckStatus {
        if self.expired {
            CheckStatus::Fail
        } else if self.days_remaining < EXPIRY_WARNING_DAYS {
            CheckStatus::Warning
        } else {
            CheckStatus::Pass
        }
    }

    fn detail(&self) -> String {
        let validity = if self.expired && self.days_remaining == 0 {
            "expired less than a day ago".to_string()
        } else if self.expired {
            format!("expired {} days ago", -self.days_remaining)
        } else {
            format!("{} days remaining", self.days_remaining)
        };
        if self.subject_alt_names.is_empty() {
            format!("{}, {}", self.subject, validity)
        } else {
            format!(
                "{}, {} [{}]",
                self.subject,
                validity,
                self.subject_alt_names.join(", ")
            )
        }
    }
}

/// Parse every `*.crt` under `dir`, sorted by path
pub fn inspect_dir(dir: &Path) -> Result<Vec<CertSummary>, CertError> {
    let mut files = Vec::new();
    collect_certs(dir, &mut files)?;
    files.sort();

    let now = Utc::now();
    let mut summaries = Vec::new();
    for path in files {
        summaries.extend(inspect_file(&path, now)?);
    }
    Ok(summaries)
}

fn collect_certs(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), CertError> {
    let entries = std::fs::read_dir(dir).map_err(|e| CertError::ParseError {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_certs(&path, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("crt") {
            files.push(path);
        }
    }
    Ok(())
}

/// Summaries of the CERTIFICATE blocks in one PEM file
pub fn inspect_file(path: &Path, now: DateTime<Utc>) -> Result<Vec<CertSummary>, CertError> {
    let parse_error = |message: String| CertError::ParseError {
        path: path.display().to_string(),
        message,
    };

    let data = std::fs::read(path).map_err(|e| parse_error(e.to_string()))?;
    let blocks = ::pem::parse_many(&data).map_err(|e| parse_error(format!("invalid PEM: {}", e)))?;

    let summaries: Vec<CertSummary> = blocks
        .iter()
        .filter(|p| p.tag() == "CERTIFICATE")
        .map(|p| summarize(path, p.contents(), now).map_err(parse_error))
        .collect::<Result<_, _>>()?;

    if summaries.is_empty() {
        return Err(parse_error("no CERTIFICATE blocks".to_string()));
    }
    Ok(summaries)
}

fn summarize(path: &Path, der: &[u8], now: DateTime<Utc>) -> Result<CertSummary, String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;

    let not_before = asn1_time_to_datetime(cert.validity().not_before)?;
    let not_after = asn1_time_to_datetime(cert.validity().not_after)?;

    Ok(CertSummary {
        path: path.to_path_buf(),
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        subject_alt_names: extract_san(&cert),
        not_before,
        not_after,
        days_remaining: (not_after - now).num_days(),
        expired: not_after < now,
        is_ca: cert.is_ca(),
        fingerprint_sha256: hex::encode(Sha256::digest(der)),
    })
}

fn extract_san(cert: &X509Certificate) -> Vec<String> {
    let mut sans = Vec::new();
    if let Ok(Some(ext)) = cert.subject_alternative_name() {
        for name in &ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => sans.push(format!("DNS:{}", dns)),
                GeneralName::IPAddress(ip) if ip.len() == 4 => {
                    sans.push(format!("IP:{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]))
                }
                GeneralName::IPAddress(ip) if ip.len() == 16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(ip);
                    sans.push(format!("IP:{}", std::net::Ipv6Addr::from(octets)))
                }
                _ => {}
            }
        }
    }
    sans
}

fn asn1_time_to_datetime(time: ASN1Time) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .ok_or_else(|| "invalid validity timestamp".to_string())
}

/// One Security check per certificate
pub fn inspection_report(summaries: &[CertSummary], base: &Path) -> ServiceReport {
    let mut report = ServiceReport::named("Certificates");
    for cert in summaries {
        let name = cert
            .path
            .strip_prefix(base)
            .unwrap_or(&cert.path)
            .display()
            .to_string();
        let outcome =
            CheckOutcome::from_status(name, CheckCategory::Security, cert.status(), cert.detail());
        report.checks.push(outcome);
    }
    report
}
