//! Result records: one per logical test.

use serde_json::{Map, Value};

use crate::identity::TestIdentity;

/// How one physical execution of a test went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStatus {
    pub passed: bool,
    /// Duration in milliseconds.
    pub duration: u64,
    /// Formatted failure message.
    pub message: Option<String>,
}

impl TestStatus {
    pub fn passed(duration: u64) -> Self {
        Self {
            passed: true,
            duration,
            message: None,
        }
    }

    pub fn failed(duration: u64, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            duration,
            message: Some(message.into()),
        }
    }
}

/// A logical test result.
///
/// Descriptive fields are fixed at creation; only the status part changes,
/// through [`TestResult::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    key: Option<String>,
    name: String,
    category: Option<String>,
    tags: Vec<String>,
    tickets: Vec<String>,
    data: Map<String, Value>,
    grouped: bool,
    passed: bool,
    duration: u64,
    message: Option<String>,
}

impl TestResult {
    pub fn new(identity: TestIdentity, status: TestStatus) -> Self {
        Self {
            key: identity.key,
            name: identity.name,
            category: identity.category,
            tags: identity.tags,
            tickets: identity.tickets,
            data: identity.data,
            grouped: identity.grouped,
            passed: status.passed,
            duration: status.duration,
            message: status.message,
        }
    }

    /// Merge another execution of the same logical test.
    pub fn update(&mut self, other: TestStatus) {
        self.passed = self.passed && other.passed;
        self.duration += other.duration;
        if let Some(message) = other.message {
            self.message = Some(match self.message.take() {
                Some(existing) => format!("{existing}\n\n{message}"),
                None => message,
            });
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Key, unless absent or blank.
    pub fn usable_key(&self) -> Option<&str> {
        self.key().filter(|k| !k.trim().is_empty())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn tickets(&self) -> &[String] {
        &self.tickets
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Identity built directly, bypassing metadata extraction.
    pub(crate) fn identity(key: Option<&str>, name: &str) -> TestIdentity {
        TestIdentity {
            key: key.map(str::to_string),
            fingerprint: crate::identity::fingerprint(&[name]),
            name: name.to_string(),
            category: None,
            tags: Vec::new(),
            tickets: Vec::new(),
            data: Map::new(),
            grouped: false,
        }
    }

    pub(crate) fn grouped_identity(key: &str, name: &str) -> TestIdentity {
        TestIdentity {
            grouped: true,
            ..identity(Some(key), name)
        }
    }
}
