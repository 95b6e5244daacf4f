// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input descriptions for a task set: which tests to run, and the execution
//! parameters shared by all of them.

use smol_str::SmolStr;
use std::time::Duration;

/// The harness side a test executes on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ExecutionEnvironment {
    /// The test runs on the device under test itself.
    Client,

    /// The test runs under a server-side harness that drives the device
    /// remotely.
    Server,
}

/// A single test to execute, as enumerated by the caller.
///
/// Immutable for the lifetime of one orchestration run.
#[derive(Clone, Debug)]
pub struct TestSpec {
    /// The test's name, unique within one request.
    pub name: SmolStr,

    /// Static labels an executor must satisfy to run this test.
    pub dependency_labels: Vec<String>,

    /// Which harness side the test runs on.
    pub execution_environment: ExecutionEnvironment,

    /// Whether this test may be retried at all.
    pub allow_retries: bool,

    /// Per-test retry cap. Zero means unbounded.
    pub max_retries: u32,
}

impl TestSpec {
    /// The largest number of retries this test permits.
    pub(crate) fn retry_cap(&self) -> u32 {
        if !self.allow_retries {
            return 0;
        }
        unbounded_if_zero(self.max_retries)
    }
}

/// Execution parameters shared by every test in one task set.
#[derive(Clone, Debug)]
pub struct ExecutionParams {
    /// Whether any test in the set may be retried.
    pub allow_retries: bool,

    /// Global retry budget shared across all tests. Zero means unbounded.
    pub max_retries: u32,

    /// Execution timeout for each remote task, enforced by the backend.
    pub task_timeout: Duration,

    /// Overall bound on launching and waiting for the whole set. None means
    /// the caller's cancellation signal is the only bound.
    pub deadline: Option<Duration>,
}

impl ExecutionParams {
    /// The largest number of retries the whole set permits.
    pub(crate) fn global_max_retries(&self) -> u32 {
        if !self.allow_retries {
            return 0;
        }
        unbounded_if_zero(self.max_retries)
    }
}

// Zero acts as an "unlimited" marker in retry configuration.
fn unbounded_if_zero(v: u32) -> u32 {
    if v == 0 { u32::MAX } else { v }
}
