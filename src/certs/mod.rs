//! Local CA and per-service TLS material
//!
//! Generation shells out to `openssl` and `keytool` through `CommandRunner`;
//! inspection parses the resulting PEM files with `x509-parser`.

pub mod inspect;
pub mod plan;

pub use inspect::{inspect_dir, inspect_file, inspection_report, CertSummary, EXPIRY_WARNING_DAYS};
pub use plan::{
    ca_cert_path, ca_key_path, extension_file, subject_alt_names, CertPlan, CertStep, PlanRequest,
    ServicePaths, StepAction,
};
