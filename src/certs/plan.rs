//! Certificate generation plan
//!
//! Planning is pure: `CertPlan::build` decides which openssl/keytool steps
//! are needed from the settings and which artifacts already exist. The plan
//! can then be printed (dry run) or executed.

use crate::config::CertSettings;
use crate::exec::{CommandRunner, ToolInvocation};
use crate::models::ServiceKind;
use crate::utils::CertError;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Tool(ToolInvocation),
    WriteFile { contents: String },
    Concat { inputs: Vec<PathBuf> },
    /// Delete a stale artifact; keytool will not import over an existing alias
    Remove,
}

/// One step producing one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertStep {
    pub description: String,
    pub output: PathBuf,
    pub action: StepAction,
}

/// Ordered generation steps
#[derive(Debug, Clone, Default)]
pub struct CertPlan {
    pub steps: Vec<CertStep>,
    /// Artifacts left in place because they already exist
    pub skipped: Vec<PathBuf>,
}

/// Paths for one service
#[derive(Debug, Clone)]
pub struct ServicePaths {
    pub key: PathBuf,
    pub csr: PathBuf,
    pub ext: PathBuf,
    pub cert: PathBuf,
}

impl ServicePaths {
    pub fn new(out_dir: &Path, service: ServiceKind) -> Self {
        let dir = out_dir.join(service.as_str());
        let name = service.as_str();
        Self {
            key: dir.join(format!("{}.key", name)),
            csr: dir.join(format!("{}.csr", name)),
            ext: dir.join(format!("{}.ext", name)),
            cert: dir.join(format!("{}.crt", name)),
        }
    }
}

pub fn ca_key_path(out_dir: &Path) -> PathBuf {
    out_dir.join("ca").join("ca.key")
}

pub fn ca_cert_path(out_dir: &Path) -> PathBuf {
    out_dir.join("ca").join("ca.crt")
}

/// Inputs to planning besides the settings
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub services: &'a [ServiceKind],
    pub keystore_password: Option<&'a str>,
    pub force: bool,
}

impl CertPlan {
    /// Plan the steps; `exists` reports whether an artifact is already on disk
    pub fn build(
        settings: &CertSettings,
        request: &PlanRequest<'_>,
        exists: impl Fn(&Path) -> bool,
    ) -> Result<Self, CertError> {
        let mut plan = CertPlan::default();
        let out = settings.out_dir.as_path();
        let openssl = settings.openssl.as_str();
        let days = settings.days.to_string();
        let ca_key = ca_key_path(out);
        let ca_cert = ca_cert_path(out);

        let keystore_password = if request.services.contains(&ServiceKind::Kafka) {
            Some(
                request
                    .keystore_password
                    .ok_or_else(|| CertError::MissingPassword {
                        key: settings.keystore_password_env.clone(),
                    })?,
            )
        } else {
            None
        };

        // a new CA invalidates every certificate it signed
        let new_ca = request.force || !exists(&ca_cert) || !exists(&ca_key);
        if new_ca {
            plan.push(
                "Generate CA key",
                &ca_key,
                StepAction::Tool(ToolInvocation::new(openssl).args([
                    "genrsa".to_string(),
                    "-out".to_string(),
                    path_arg(&ca_key),
                    settings.ca_key_bits.to_string(),
                ])),
            );
            plan.push(
                "Self-sign CA certificate",
                &ca_cert,
                StepAction::Tool(ToolInvocation::new(openssl).args([
                    "req".to_string(),
                    "-x509".to_string(),
                    "-new".to_string(),
                    "-nodes".to_string(),
                    "-key".to_string(),
                    path_arg(&ca_key),
                    "-sha256".to_string(),
                    "-days".to_string(),
                    days.clone(),
                    "-subj".to_string(),
                    format!("/CN={}", settings.ca_common_name),
                    "-out".to_string(),
                    path_arg(&ca_cert),
                ])),
            );
        } else {
            plan.skipped.push(ca_cert.clone());
        }

        for service in request.services {
            let paths = ServicePaths::new(out, *service);
            let reissue = new_ca || !exists(&paths.cert) || !exists(&paths.key);

            if reissue {
                plan.push_service_cert(settings, *service, &paths, &ca_key, &ca_cert);
            } else {
                plan.skipped.push(paths.cert.clone());
            }

            match service {
                ServiceKind::Mongodb => {
                    let pem = paths.cert.with_extension("pem");
                    if reissue || !exists(&pem) {
                        plan.push(
                            "Combine MongoDB key and certificate",
                            &pem,
                            StepAction::Concat {
                                inputs: vec![paths.key.clone(), paths.cert.clone()],
                            },
                        );
                    } else {
                        plan.skipped.push(pem);
                    }
                }
                ServiceKind::Kafka => {
                    if let Some(password) = keystore_password {
                        plan.push_kafka_stores(settings, &paths, &ca_cert, password, reissue, &exists);
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Certificate plan: {} step(s), {} skipped",
            plan.steps.len(),
            plan.skipped.len()
        );
        Ok(plan)
    }

    fn push(&mut self, description: impl Into<String>, output: &Path, action: StepAction) {
        self.steps.push(CertStep {
            description: description.into(),
            output: output.to_path_buf(),
            action,
        });
    }

    fn push_service_cert(
        &mut self,
        settings: &CertSettings,
        service: ServiceKind,
        paths: &ServicePaths,
        ca_key: &Path,
        ca_cert: &Path,
    ) {
        let openssl = settings.openssl.as_str();
        let name = service.display_name();

        self.push(
            format!("Generate {} key", name),
            &paths.key,
            StepAction::Tool(ToolInvocation::new(openssl).args([
                "genrsa".to_string(),
                "-out".to_string(),
                path_arg(&paths.key),
                settings.key_bits.to_string(),
            ])),
        );
        self.push(
            format!("Create {} signing request", name),
            &paths.csr,
            StepAction::Tool(ToolInvocation::new(openssl).args([
                "req".to_string(),
                "-new".to_string(),
                "-key".to_string(),
                path_arg(&paths.key),
                "-subj".to_string(),
                format!("/CN={}", service.as_str()),
                "-out".to_string(),
                path_arg(&paths.csr),
            ])),
        );
        self.push(
            format!("Write {} SAN extensions", name),
            &paths.ext,
            StepAction::WriteFile {
                contents: extension_file(service, &settings.extra_sans),
            },
        );
        self.push(
            format!("Sign {} certificate with the CA", name),
            &paths.cert,
            StepAction::Tool(ToolInvocation::new(openssl).args([
                "x509".to_string(),
                "-req".to_string(),
                "-in".to_string(),
                path_arg(&paths.csr),
                "-CA".to_string(),
                path_arg(ca_cert),
                "-CAkey".to_string(),
                path_arg(ca_key),
                "-CAcreateserial".to_string(),
                "-days".to_string(),
                settings.days.to_string(),
                "-sha256".to_string(),
                "-extfile".to_string(),
                path_arg(&paths.ext),
                "-out".to_string(),
                path_arg(&paths.cert),
            ])),
        );
    }

    fn push_kafka_stores(
        &mut self,
        settings: &CertSettings,
        paths: &ServicePaths,
        ca_cert: &Path,
        password: &str,
        reissue: bool,
        exists: &impl Fn(&Path) -> bool,
    ) {
        let p12 = paths.cert.with_extension("p12");
        let dir = paths.cert.parent().map(Path::to_path_buf).unwrap_or_default();
        let keystore = dir.join("kafka.keystore.jks");
        let truststore = dir.join("kafka.truststore.jks");

        if reissue || !exists(&keystore) {
            if exists(&keystore) {
                self.push("Remove old Kafka keystore", &keystore, StepAction::Remove);
            }
            self.push(
                "Export Kafka PKCS#12 bundle",
                &p12,
                StepAction::Tool(ToolInvocation::new(&settings.openssl).args([
                    "pkcs12".to_string(),
                    "-export".to_string(),
                    "-in".to_string(),
                    path_arg(&paths.cert),
                    "-inkey".to_string(),
                    path_arg(&paths.key),
                    "-certfile".to_string(),
                    path_arg(ca_cert),
                    "-name".to_string(),
                    "kafka".to_string(),
                    "-passout".to_string(),
                    format!("pass:{}", password),
                    "-out".to_string(),
                    path_arg(&p12),
                ])),
            );
            self.push(
                "Import Kafka keystore",
                &keystore,
                StepAction::Tool(ToolInvocation::new(&settings.keytool).args([
                    "-importkeystore".to_string(),
                    "-srckeystore".to_string(),
                    path_arg(&p12),
                    "-srcstoretype".to_string(),
                    "PKCS12".to_string(),
                    "-srcstorepass".to_string(),
                    password.to_string(),
                    "-destkeystore".to_string(),
                    path_arg(&keystore),
                    "-deststoretype".to_string(),
                    "JKS".to_string(),
                    "-deststorepass".to_string(),
                    password.to_string(),
                    "-noprompt".to_string(),
                ])),
            );
        } else {
            self.skipped.push(keystore);
        }

        if reissue || !exists(&truststore) {
            if exists(&truststore) {
                self.push("Remove old Kafka truststore", &truststore, StepAction::Remove);
            }
            self.push(
                "Import CA into Kafka truststore",
                &truststore,
                StepAction::Tool(ToolInvocation::new(&settings.keytool).args([
                    "-import".to_string(),
                    "-trustcacerts".to_string(),
                    "-alias".to_string(),
                    "CARoot".to_string(),
                    "-file".to_string(),
                    path_arg(ca_cert),
                    "-keystore".to_string(),
                    path_arg(&truststore),
                    "-storepass".to_string(),
                    password.to_string(),
                    "-noprompt".to_string(),
                ])),
            );
        } else {
            self.skipped.push(truststore);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first failure
    pub async fn execute(
        &self,
        runner: &dyn CommandRunner,
        on_step: &dyn Fn(usize, &CertStep),
    ) -> Result<usize, CertError> {
        for (index, step) in self.steps.iter().enumerate() {
            on_step(index, step);
            info!("{}", step.description);

            if let Some(parent) = step.output.parent() {
                std::fs::create_dir_all(parent).map_err(|e| CertError::WriteError {
                    path: parent.display().to_string(),
                    message: e.to_string(),
                })?;
            }

            match &step.action {
                StepAction::Tool(invocation) => {
                    let output =
                        runner
                            .run(invocation)
                            .await
                            .map_err(|e| CertError::StepFailed {
                                step: step.description.clone(),
                                message: e.to_string(),
                            })?;
                    if !output.success() {
                        return Err(CertError::StepFailed {
                            step: step.description.clone(),
                            message: output.error_text(),
                        });
                    }
                }
                StepAction::WriteFile { contents } => {
                    write_file(&step.output, contents.as_bytes())?;
                }
                StepAction::Concat { inputs } => {
                    let mut combined = Vec::new();
                    for input in inputs {
                        let data = std::fs::read(input).map_err(|e| CertError::StepFailed {
                            step: step.description.clone(),
                            message: format!("{}: {}", input.display(), e),
                        })?;
                        combined.extend_from_slice(&data);
                        if !combined.ends_with(b"\n") {
                            combined.push(b'\n');
                        }
                    }
                    write_file(&step.output, &combined)?;
                }
                StepAction::Remove => match std::fs::remove_file(&step.output) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(CertError::WriteError {
                            path: step.output.display().to_string(),
                            message: e.to_string(),
                        })
                    }
                },
            }
        }
        Ok(self.steps.len())
    }
}

impl fmt::Display for CertPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps.iter().enumerate() {
            writeln!(f, "{:>3}. {}", index + 1, step.description)?;
            match &step.action {
                StepAction::Tool(invocation) => writeln!(f, "       $ {}", invocation.display())?,
                StepAction::WriteFile { .. } => {
                    writeln!(f, "       write {}", step.output.display())?
                }
                StepAction::Concat { inputs } => writeln!(
                    f,
                    "       cat {} > {}",
                    inputs
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(" "),
                    step.output.display()
                )?,
                StepAction::Remove => writeln!(f, "       rm {}", step.output.display())?,
            }
        }
        for path in &self.skipped {
            writeln!(f, "  - keep {} (exists, use --force to regenerate)", path.display())?;
        }
        Ok(())
    }
}

/// Subject alternative names for a service certificate
pub fn subject_alt_names(service: ServiceKind, extra: &[String]) -> Vec<String> {
    let mut sans = vec![
        format!("DNS:{}", service.as_str()),
        "DNS:localhost".to_string(),
        "IP:127.0.0.1".to_string(),
    ];
    for name in extra {
        let name = name.trim();
        let entry = if name.starts_with("DNS:") || name.starts_with("IP:") {
            name.to_string()
        } else if name.parse::<IpAddr>().is_ok() {
            format!("IP:{}", name)
        } else {
            format!("DNS:{}", name)
        };
        if !name.is_empty() && !sans.contains(&entry) {
            sans.push(entry);
        }
    }
    sans
}

/// openssl `-extfile` contents for a server/client certificate
pub fn extension_file(service: ServiceKind, extra: &[String]) -> String {
    format!(
        "authorityKeyIdentifier=keyid,issuer\n\
         basicConstraints=CA:FALSE\n\
         keyUsage=digitalSignature,keyEncipherment\n\
         extendedKeyUsage=serverAuth,clientAuth\n\
         subjectAltName={}\n",
        subject_alt_names(service, extra).join(",")
    )
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), CertError> {
    std::fs::write(path, data).map_err(|e| CertError::WriteError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
