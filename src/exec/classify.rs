//! Classification of tool error text
//!
//! The wrapped tools only report failures as text, so benign conditions
//! ("already exists") and retryable ones (Kafka's `AccessDeniedException`
//! while a topic directory is being removed) are recognised by pattern.

use regex::RegexSet;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccessDenied,
    AlreadyExists,
    AuthFailed,
    NotFound,
    Timeout,
    Other,
}

/// Patterns in priority order, one per kind above (except `Other`)
static PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)AccessDeniedException|access denied|permission denied",
        r"(?i)already exists|TopicExistsException|resource_already_exists_exception|There is already an object named",
        r"(?i)authentication failed|login failed for user|security_exception|unauthorized",
        r"(?i)does not exist|not found|UnknownTopicOrPartitionException|index_not_found_exception|Cannot drop the table",
        r"(?i)timed out|TimeoutException",
    ])
    .unwrap_or_else(|_| RegexSet::empty())
});

const KINDS: [ErrorKind; 5] = [
    ErrorKind::AccessDenied,
    ErrorKind::AlreadyExists,
    ErrorKind::AuthFailed,
    ErrorKind::NotFound,
    ErrorKind::Timeout,
];

/// Classify error text from a tool
pub fn classify(text: &str) -> ErrorKind {
    PATTERNS
        .matches(text)
        .into_iter()
        .next()
        .map_or(ErrorKind::Other, |index| KINDS[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kafka_access_denied() {
        let text = "Error while executing topic command : java.nio.file.AccessDeniedException: /var/lib/kafka/data/doctor-1-0";
        assert_eq!(classify(text), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_already_exists_variants() {
        assert_eq!(
            classify("Error: Topic 'doctor-x' already exists."),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            classify(r#"{"error":{"type":"resource_already_exists_exception"}}"#),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            classify("Msg 2714: There is already an object named 'doctor_x' in the database."),
            ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_auth_and_timeout() {
        assert_eq!(
            classify("Login failed for user 'sa'."),
            ErrorKind::AuthFailed
        );
        assert_eq!(
            classify("org.apache.kafka.common.errors.TimeoutException"),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_other() {
        assert_eq!(classify("something odd"), ErrorKind::Other);
        assert_eq!(classify(""), ErrorKind::Other);
    }
}
