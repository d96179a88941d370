//! Test run aggregation.

use crate::error::ProbeDockResult;
use crate::identity::TestIdentity;
use crate::meta::Holder;
use crate::payload::{self, Payload, PayloadOptions};
use crate::project::ProjectProfile;
use crate::result::{TestResult, TestStatus};

/// All results of one test run, in insertion order.
#[derive(Debug, Clone)]
pub struct TestRun {
    project: ProjectProfile,
    duration: u64,
    uid: Option<String>,
    results: Vec<TestResult>,
}

impl TestRun {
    pub fn new(project: ProjectProfile) -> Self {
        Self {
            project,
            duration: 0,
            uid: None,
            results: Vec::new(),
        }
    }

    pub fn project(&self) -> &ProjectProfile {
        &self.project
    }

    /// Run duration in milliseconds.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration;
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn set_uid(&mut self, uid: impl Into<String>) {
        self.uid = Some(uid.into());
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Record one execution.
    ///
    /// A grouped identity is merged into the existing grouped record with the
    /// same key, if any. Everything else gets its own record.
    pub fn add(&mut self, identity: TestIdentity, status: TestStatus) {
        if identity.grouped {
            let existing = self
                .results
                .iter_mut()
                .find(|r| r.is_grouped() && r.key() == identity.key.as_deref());
            if let Some(existing) = existing {
                existing.update(status);
                return;
            }
        }

        self.results.push(TestResult::new(identity, status));
    }

    /// Extract the identity of `test` and record the execution.
    pub fn add_execution(&mut self, groups: &[Holder], test: &Holder, status: TestStatus) {
        let identity = TestIdentity::extract(&self.project, groups, test);
        self.add(identity, status);
    }

    /// Records with an absent or blank key.
    pub fn results_without_key(&self) -> Vec<&TestResult> {
        self.results
            .iter()
            .filter(|r| r.usable_key().is_none())
            .collect()
    }

    /// Records grouped by key, in order of first appearance. Blank keys are skipped.
    pub fn results_by_key(&self) -> Vec<(&str, Vec<&TestResult>)> {
        let mut by_key: Vec<(&str, Vec<&TestResult>)> = Vec::new();
        for result in &self.results {
            let Some(key) = result.usable_key() else {
                continue;
            };
            match by_key.iter_mut().find(|(k, _)| *k == key) {
                Some((_, results)) => results.push(result),
                None => by_key.push((key, vec![result])),
            }
        }
        by_key
    }

    /// Data-quality problems worth reporting. Never fatal.
    pub fn quality_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let keyless = self.results_without_key();
        if !keyless.is_empty() {
            let mut msg = String::from("the following test results are missing a key");
            for r in keyless {
                msg.push_str(&format!("\n  - {}", r.name()));
            }
            warnings.push(msg);
        }

        let duplicates: Vec<_> = self
            .results_by_key()
            .into_iter()
            .filter(|(_, results)| results.len() >= 2)
            .collect();
        if !duplicates.is_empty() {
            let mut msg = String::from("the following keys are used by multiple test results");
            for (key, results) in duplicates {
                msg.push_str(&format!("\n  - {key}"));
                for r in results {
                    msg.push_str(&format!("\n    - {}", r.name()));
                }
            }
            warnings.push(msg);
        }

        warnings
    }

    /// Validate the project and serialize the run.
    pub fn to_payload(&self, options: &PayloadOptions<'_>) -> ProbeDockResult<Payload> {
        self.project.validate()?;
        Ok(payload::encode(self, options))
    }
}
