//! Services that make up the compose stack

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A service in the compose stack, in canonical test order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Elasticsearch,
    Kibana,
    Mongodb,
    Kafka,
    Zookeeper,
    #[value(alias = "mssql")]
    Sqlserver,
}

impl ServiceKind {
    /// Every service, in the order tests run by default
    pub const ALL: [ServiceKind; 6] = [
        ServiceKind::Elasticsearch,
        ServiceKind::Kibana,
        ServiceKind::Mongodb,
        ServiceKind::Kafka,
        ServiceKind::Zookeeper,
        ServiceKind::Sqlserver,
    ];

    /// Lowercase identifier, also the compose service name
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Elasticsearch => "elasticsearch",
            ServiceKind::Kibana => "kibana",
            ServiceKind::Mongodb => "mongodb",
            ServiceKind::Kafka => "kafka",
            ServiceKind::Zookeeper => "zookeeper",
            ServiceKind::Sqlserver => "sqlserver",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceKind::Elasticsearch => "Elasticsearch",
            ServiceKind::Kibana => "Kibana",
            ServiceKind::Mongodb => "MongoDB",
            ServiceKind::Kafka => "Kafka",
            ServiceKind::Zookeeper => "Zookeeper",
            ServiceKind::Sqlserver => "SQL Server",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ServiceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == needle || (needle == "mssql" && *k == ServiceKind::Sqlserver))
            .ok_or_else(|| format!("unknown service '{}'", s.trim()))
    }
}
