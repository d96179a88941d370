//! Adapter between test-framework events and a [`TestRun`].
//!
//! The host framework reports suite, group and test events; the collector keeps
//! the stack of enclosing groups and times each test.

use std::time::{Duration, Instant};

use crate::meta::Holder;
use crate::project::ProjectProfile;
use crate::result::TestStatus;
use crate::run::TestRun;

/// Builds a [`TestRun`] from framework events.
#[derive(Debug)]
pub struct Collector {
    run: TestRun,
    groups: Vec<Holder>,
    started_at: Option<Instant>,
    test_started_at: Option<Instant>,
}

impl Collector {
    pub fn new(project: ProjectProfile) -> Self {
        Self {
            run: TestRun::new(project),
            groups: Vec::new(),
            started_at: None,
            test_started_at: None,
        }
    }

    /// Suite started.
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn enter_group(&mut self, group: Holder) {
        self.groups.push(group);
    }

    pub fn exit_group(&mut self) {
        self.groups.pop();
    }

    pub fn start_test(&mut self) {
        self.test_started_at = Some(Instant::now());
    }

    pub fn test_passed(&mut self, test: &Holder) {
        let status = TestStatus::passed(elapsed_millis(self.test_started_at));
        self.run.add_execution(&self.groups, test, status);
    }

    /// `message` is usually built with [`format_failure_message`].
    pub fn test_failed(&mut self, test: &Holder, message: impl Into<String>) {
        let status = TestStatus::failed(elapsed_millis(self.test_started_at), message);
        self.run.add_execution(&self.groups, test, status);
    }

    /// Suite finished; records the run duration.
    pub fn stop(&mut self) {
        self.run.set_duration(elapsed_millis(self.started_at));
    }

    /// Groups currently entered, outermost first.
    pub fn groups(&self) -> &[Holder] {
        &self.groups
    }

    pub fn run(&self) -> &TestRun {
        &self.run
    }

    pub fn finish(self) -> TestRun {
        self.run
    }
}

fn elapsed_millis(since: Option<Instant>) -> u64 {
    since.map_or(0, |start| round_millis(start.elapsed()))
}

fn round_millis(duration: Duration) -> u64 {
    (duration.as_secs_f64() * 1000.0).round() as u64
}

/// Failure message: the test description, the indented failure lines, then the backtrace.
pub fn format_failure_message<L, B>(description: &str, message_lines: L, backtrace: B) -> String
where
    L: IntoIterator,
    L::Item: AsRef<str>,
    B: IntoIterator,
    B::Item: AsRef<str>,
{
    let lines: Vec<String> = message_lines
        .into_iter()
        .map(|l| format!("  {}", l.as_ref()))
        .collect();
    let trace: Vec<String> = backtrace
        .into_iter()
        .map(|l| format!("  # {}", l.as_ref()))
        .collect();

    format!("{}\n{}\n{}", description, lines.join("\n"), trace.join("\n"))
}
