// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Summary types for [fleetrun](https://crates.io/crates/fleetrun-runner) reports.
//!
//! A task set run produces an [`ExecuteReport`]: one entry per remote attempt
//! of every test, plus the aggregate verdict and lifecycle for the set as a
//! whole. The types in this crate are serializable and form the stable
//! surface consumed by downstream reporting tools; how (and whether) a report
//! is serialized is up to the consumer.

use chrono::{DateTime, Utc};
use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, time::Duration};

/// UUID kind for fleetrun run IDs.
pub enum RunKind {}

impl TypedUuidKind for RunKind {
    #[inline]
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("fleetrun_run");
        TAG
    }
}

/// The unique identifier for one task set run.
pub type RunId = TypedUuid<RunKind>;

/// Normalized outcome of an attempt, a test run, or a whole task set.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// No verdict was reached: the execution is unfinished, or the test was
    /// rejected before any attempt could be made.
    Unspecified,

    /// The execution finished but produced no test cases to judge.
    NoVerdict,

    /// All judged test cases passed.
    Passed,

    /// A retry passed after an earlier attempt had failed.
    ///
    /// Only produced for a whole test run, never for a single attempt.
    PassedOnRetry,

    /// At least one test case failed, or the execution terminated without
    /// usable results.
    Failed,
}

impl Verdict {
    /// Returns the string form of this verdict.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Unspecified => "unspecified",
            Verdict::NoVerdict => "no-verdict",
            Verdict::Passed => "passed",
            Verdict::PassedOnRetry => "passed-on-retry",
            Verdict::Failed => "failed",
        }
    }

    /// Returns true if this verdict makes the aggregate verdict of a
    /// completed task set [`Failed`](Self::Failed).
    ///
    /// A test with no verdict is informative but does not fail the set.
    pub fn is_failure(self) -> bool {
        match self {
            Verdict::Unspecified | Verdict::Failed => true,
            Verdict::NoVerdict | Verdict::Passed | Verdict::PassedOnRetry => false,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse task status used in reports, never in internal decision-making.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    /// The task is waiting for an executor.
    Pending,

    /// The task is executing.
    Running,

    /// The task ran to completion and its results were obtainable.
    Completed,

    /// The task was cancelled, or expired before an executor picked it up.
    Cancelled,

    /// The task was stopped mid-flight: the executor died, the task was
    /// killed, or it timed out.
    Aborted,

    /// The task was never scheduled.
    Rejected,
}

impl Lifecycle {
    /// Returns the string form of this lifecycle.
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Pending => "pending",
            Lifecycle::Running => "running",
            Lifecycle::Completed => "completed",
            Lifecycle::Cancelled => "cancelled",
            Lifecycle::Aborted => "aborted",
            Lifecycle::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One report entry: a single remote attempt of a single test, or the
/// synthetic entry for a test that was rejected before launch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskResultSummary {
    /// The test's name.
    pub name: SmolStr,

    /// Zero-based index of this attempt within its test run.
    pub attempt: u32,

    /// Externally-resolvable URL for the remote task. None for a rejected
    /// test, which never had a task.
    pub task_url: Option<String>,

    /// The attempt's lifecycle at rendering time.
    pub life_cycle: Lifecycle,

    /// The attempt's verdict at rendering time.
    pub verdict: Verdict,
}

/// Aggregate state of a task set.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskSetState {
    /// The task set's own lifecycle.
    pub life_cycle: Lifecycle,

    /// The aggregate verdict. [`Verdict::Unspecified`] until the set
    /// completes.
    pub verdict: Verdict,
}

/// The aggregated report for one task set run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecuteReport {
    /// The unique ID for this run.
    pub run_id: RunId,

    /// The time at which the run started.
    pub start_time: DateTime<Utc>,

    /// Time elapsed since the start of the run, at rendering time.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,

    /// Aggregate state for the whole set.
    pub state: TaskSetState,

    /// One entry per attempt of every test, in input order; rejected tests
    /// contribute a single synthetic entry.
    pub task_results: Vec<TaskResultSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_failure_classification() {
        assert!(Verdict::Unspecified.is_failure());
        assert!(Verdict::Failed.is_failure());
        assert!(!Verdict::Passed.is_failure());
        assert!(!Verdict::PassedOnRetry.is_failure());
        assert!(!Verdict::NoVerdict.is_failure(), "no verdict is not a failure");
    }

    #[test]
    fn display_matches_serde_form() {
        let verdict = serde_json::to_value(Verdict::PassedOnRetry).unwrap();
        assert_eq!(verdict, serde_json::Value::String("passed-on-retry".into()));
        assert_eq!(Verdict::PassedOnRetry.to_string(), "passed-on-retry");

        let lifecycle = serde_json::to_value(Lifecycle::Rejected).unwrap();
        assert_eq!(lifecycle, serde_json::Value::String("rejected".into()));
        assert_eq!(Lifecycle::Rejected.to_string(), "rejected");
    }

    #[test]
    fn report_round_trip() {
        let report = ExecuteReport {
            run_id: RunId::new_v4(),
            start_time: Utc::now(),
            elapsed: Duration::from_secs(95),
            state: TaskSetState {
                life_cycle: Lifecycle::Completed,
                verdict: Verdict::Passed,
            },
            task_results: vec![TaskResultSummary {
                name: "network.Ping".into(),
                attempt: 0,
                task_url: Some("https://backend.example.com/task=abc123".to_owned()),
                life_cycle: Lifecycle::Completed,
                verdict: Verdict::Passed,
            }],
        };

        let json = serde_json::to_string(&report).unwrap();
        let parsed: ExecuteReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
