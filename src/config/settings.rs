//! Application settings configuration
//!
//! Defines compose invocation, per-service connection details, timeouts and
//! the certificate and image layouts.

use crate::models::ServiceKind;
use crate::utils::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to invoke Docker Compose
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    /// Program to run, `docker-compose` or `docker`
    pub program: String,
    /// Leading arguments, e.g. `["compose"]` for the docker plugin
    pub args: Vec<String>,
    pub file: Option<PathBuf>,
    pub project: Option<String>,
    pub env_file: PathBuf,
    pub health_poll_secs: u64,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            program: "docker-compose".to_string(),
            args: vec![],
            file: None,
            project: None,
            env_file: PathBuf::from(".env"),
            health_poll_secs: 5,
        }
    }
}

impl ComposeSettings {
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_secs(self.health_poll_secs.max(1))
    }
}

/// Test runner settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub service_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub max_parallel: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            service_timeout_secs: 300,
            command_timeout_secs: 60,
            max_parallel: 3,
        }
    }
}

impl RunnerSettings {
    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Fixed-delay retry settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 2000,
        }
    }
}

impl RetrySettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Elasticsearch HTTP settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElasticsearchSettings {
    pub url: String,
    pub username: String,
    /// Environment variable holding the password
    pub password_env: String,
    /// PEM CA bundle to trust, usually the generated local CA
    pub ca_cert: Option<PathBuf>,
    pub accept_invalid_certs: bool,
    pub index_prefix: String,
    pub request_timeout_secs: u64,
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        Self {
            url: "https://localhost:9200".to_string(),
            username: "elastic".to_string(),
            password_env: "LOCAL_BACKEND_BOOTSTRAP_PASSWORD".to_string(),
            ca_cert: Some(PathBuf::from("certs/ca/ca.crt")),
            accept_invalid_certs: false,
            index_prefix: "doctor".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ElasticsearchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Kibana HTTP settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KibanaSettings {
    pub url: String,
    pub username: String,
    pub password_env: String,
}

impl Default for KibanaSettings {
    fn default() -> Self {
        Self {
            url: "https://localhost:5601".to_string(),
            username: "elastic".to_string(),
            password_env: "LOCAL_BACKEND_BOOTSTRAP_PASSWORD".to_string(),
        }
    }
}

/// MongoDB settings (checks run through mongosh inside the container)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoSettings {
    pub container: String,
    pub shell: String,
    pub port: u16,
    pub username: String,
    pub password_env: String,
    pub auth_database: String,
    pub database: String,
    pub tls: bool,
    /// CA file path inside the container
    pub tls_ca_file: Option<String>,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            container: "mongodb".to_string(),
            shell: "mongosh".to_string(),
            port: 27017,
            username: "admin".to_string(),
            password_env: "LOCAL_BACKEND_BOOTSTRAP_PASSWORD".to_string(),
            auth_database: "admin".to_string(),
            database: "doctor".to_string(),
            tls: true,
            tls_ca_file: Some("/etc/mongodb/certs/ca.crt".to_string()),
        }
    }
}

/// Kafka settings (checks run through the bundled CLI inside the container)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaSettings {
    pub container: String,
    pub bootstrap_server: String,
    /// Directory of the kafka-*.sh scripts inside the container
    pub script_dir: String,
    /// Script suffix, `.sh` for Apache images, empty for Confluent images
    pub script_suffix: String,
    /// Client properties file inside the container (SSL settings)
    pub command_config: Option<String>,
    pub partitions: u32,
    pub replication_factor: u32,
    pub consume_timeout_ms: u64,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            container: "kafka".to_string(),
            bootstrap_server: "localhost:9092".to_string(),
            script_dir: "/opt/kafka/bin".to_string(),
            script_suffix: ".sh".to_string(),
            command_config: None,
            partitions: 1,
            replication_factor: 1,
            consume_timeout_ms: 15000,
        }
    }
}

impl KafkaSettings {
    /// Full path of a Kafka CLI tool, e.g. `kafka-topics`
    pub fn script(&self, name: &str) -> String {
        let dir = self.script_dir.trim_end_matches('/');
        if dir.is_empty() {
            format!("{}{}", name, self.script_suffix)
        } else {
            format!("{}/{}{}", dir, name, self.script_suffix)
        }
    }
}

/// Zookeeper settings (four-letter words over TCP)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZookeeperSettings {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for ZookeeperSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 2181,
            timeout_secs: 5,
        }
    }
}

impl ZookeeperSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// SQL Server settings (checks run through sqlcmd inside the container)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqlServerSettings {
    pub container: String,
    pub sqlcmd: String,
    pub server: String,
    pub username: String,
    pub password_env: String,
    pub database: String,
    pub trust_server_certificate: bool,
}

impl Default for SqlServerSettings {
    fn default() -> Self {
        Self {
            container: "sqlserver".to_string(),
            sqlcmd: "/opt/mssql-tools18/bin/sqlcmd".to_string(),
            server: "localhost".to_string(),
            username: "sa".to_string(),
            password_env: "SQLSERVER_SA_PASSWORD".to_string(),
            database: "tempdb".to_string(),
            trust_server_certificate: true,
        }
    }
}

/// Certificate generation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CertSettings {
    pub out_dir: PathBuf,
    pub days: u32,
    pub ca_common_name: String,
    pub ca_key_bits: u32,
    pub key_bits: u32,
    pub services: Vec<ServiceKind>,
    pub extra_sans: Vec<String>,
    pub keystore_password_env: String,
    pub openssl: String,
    pub keytool: String,
}

impl Default for CertSettings {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("certs"),
            days: 825,
            ca_common_name: "Local Backend Dev CA".to_string(),
            ca_key_bits: 4096,
            key_bits: 2048,
            services: vec![
                ServiceKind::Elasticsearch,
                ServiceKind::Kibana,
                ServiceKind::Mongodb,
                ServiceKind::Kafka,
                ServiceKind::Sqlserver,
            ],
            extra_sans: vec![],
            keystore_password_env: "KAFKA_KEYSTORE_PASSWORD".to_string(),
            openssl: "openssl".to_string(),
            keytool: "keytool".to_string(),
        }
    }
}

/// One buildable image
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSpec {
    pub service: ServiceKind,
    pub repository: String,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
}

/// Image build/push settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub docker: String,
    pub registry_prefix: String,
    pub tag: String,
    pub images: Vec<ImageSpec>,
    pub build_timeout_secs: u64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            registry_prefix: String::new(),
            tag: "latest".to_string(),
            images: ServiceKind::ALL
                .iter()
                .map(|service| ImageSpec {
                    service: *service,
                    repository: format!("local-backend-{}", service.as_str()),
                    context: PathBuf::from("docker").join(service.as_str()),
                    dockerfile: None,
                })
                .collect(),
            build_timeout_secs: 1800,
        }
    }
}

impl ImageSettings {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }
}

/// Application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compose: ComposeSettings,
    pub runner: RunnerSettings,
    pub retry: RetrySettings,
    pub elasticsearch: ElasticsearchSettings,
    pub kibana: KibanaSettings,
    pub mongodb: MongoSettings,
    pub kafka: KafkaSettings,
    pub zookeeper: ZookeeperSettings,
    pub sqlserver: SqlServerSettings,
    pub certs: CertSettings,
    pub images: ImageSettings,
}

impl Settings {
    /// Load settings from the default config file
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_path = Path::new("config/default.toml");
        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        Self::from_toml(&content)
    }

    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.max_parallel == 0 {
            return Err(ConfigError::InvalidValue {
                key: "runner.max_parallel".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
