// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    backend::{RemoteClient, TaskUrler},
    cancel::{CancelReason, CancelWatcher},
    errors::{ExecuteError, LaunchError, WaitError},
    request::RequestBuilder,
    results::ResultStore,
    runner::TestRun,
    spec::{ExecutionParams, TestSpec},
    time::{StopwatchStart, stopwatch},
};
use fleetrun_metadata::{ExecuteReport, Lifecycle, RunId, TaskSetState, Verdict};
use std::{future, time::Duration};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::debug;

/// Fixed delay between poll sweeps.
const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// The running state of one batch of remote test executions.
///
/// A `TaskSet` owns all of its test runs and, transitively, all attempts; no
/// other component mutates them. The set of test runs is fixed at
/// construction.
#[derive(Debug)]
pub struct TaskSet {
    run_id: RunId,
    params: ExecutionParams,
    test_runs: Vec<TestRun>,
    global_max_retries: u32,
    // Incremented once per retry launch across all test runs; all updates
    // happen behind &mut self, which serializes them against the budget.
    retries_used: u32,
    complete: bool,
    running: bool,
    stopwatch: StopwatchStart,
}

impl TaskSet {
    /// Creates a task set for the given tests.
    pub fn new(specs: Vec<TestSpec>, params: ExecutionParams) -> Self {
        let test_runs = specs.into_iter().map(TestRun::new).collect();
        let global_max_retries = params.global_max_retries();
        Self {
            run_id: RunId::new_v4(),
            params,
            test_runs,
            global_max_retries,
            retries_used: 0,
            complete: false,
            running: true,
            stopwatch: stopwatch(),
        }
    }

    /// The unique id of this run.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The test runs in this set, in input order.
    pub fn test_runs(&self) -> &[TestRun] {
        &self.test_runs
    }

    /// Retries launched so far across all test runs.
    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    /// Whether every test run completed before the poll loop stopped.
    pub fn complete(&self) -> bool {
        self.complete
    }

    /// Whether [`launch_and_wait`](Self::launch_and_wait) is still in flight.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Launches every runnable test, then polls for results until all test
    /// runs complete, retrying failed attempts within the global and
    /// per-test budgets.
    ///
    /// On cancellation, deadline expiry, or error, the task set keeps
    /// whatever partial state it reached; [`response`](Self::response)
    /// renders it. Already-launched remote tasks are not cancelled.
    pub async fn launch_and_wait<C, B, S>(
        &mut self,
        client: &C,
        builder: &B,
        store: &S,
        cancel: &mut CancelWatcher,
    ) -> Result<(), ExecuteError>
    where
        C: RemoteClient,
        B: RequestBuilder,
        S: ResultStore,
    {
        let result = self.launch_and_wait_inner(client, builder, store, cancel).await;
        // The one place the running flag is released, on every return path.
        self.running = false;
        result
    }

    async fn launch_and_wait_inner<C, B, S>(
        &mut self,
        client: &C,
        builder: &B,
        store: &S,
        cancel: &mut CancelWatcher,
    ) -> Result<(), ExecuteError>
    where
        C: RemoteClient,
        B: RequestBuilder,
        S: ResultStore,
    {
        let deadline = self.params.deadline.map(|timeout| Instant::now() + timeout);
        self.launch_all(client, builder).await?;
        self.wait(client, builder, store, cancel, deadline).await?;
        Ok(())
    }

    /// Validates dependencies and launches the initial attempt for every
    /// test. Any error aborts the sweep immediately; test runs launched so
    /// far are left as-is.
    async fn launch_all<C, B>(&mut self, client: &C, builder: &B) -> Result<(), LaunchError>
    where
        C: RemoteClient,
        B: RequestBuilder,
    {
        for i in 0..self.test_runs.len() {
            let runnable = self.test_runs[i]
                .validate_dependencies(client, builder, &self.params)
                .await?;
            if !runnable {
                debug!(
                    test = self.test_runs[i].name(),
                    "no executor satisfies dependencies, rejecting"
                );
                self.test_runs[i].mark_not_runnable();
                continue;
            }
            self.test_runs[i]
                .launch_attempt(client, builder, &self.params)
                .await?;
        }
        Ok(())
    }

    async fn wait<C, B, S>(
        &mut self,
        client: &C,
        builder: &B,
        store: &S,
        cancel: &mut CancelWatcher,
        deadline: Option<Instant>,
    ) -> Result<(), WaitError>
    where
        C: RemoteClient,
        B: RequestBuilder,
        S: ResultStore,
    {
        loop {
            if let Some(reason) = cancel.check() {
                return Err(WaitError::Cancelled { reason });
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(WaitError::Cancelled {
                    reason: CancelReason::DeadlineExceeded,
                });
            }

            if self.tick(client, builder, store).await? {
                self.complete = true;
                return Ok(());
            }

            tokio::select! {
                reason = cancel.cancelled() => {
                    return Err(WaitError::Cancelled { reason });
                }
                () = deadline_reached(deadline) => {
                    return Err(WaitError::Cancelled {
                        reason: CancelReason::DeadlineExceeded,
                    });
                }
                () = sleep(POLL_INTERVAL) => {}
            }
        }
    }

    /// One poll sweep over all incomplete test runs. Returns true once every
    /// test run is complete.
    async fn tick<C, B, S>(
        &mut self,
        client: &C,
        builder: &B,
        store: &S,
    ) -> Result<bool, WaitError>
    where
        C: RemoteClient,
        B: RequestBuilder,
        S: ResultStore,
    {
        let mut complete = true;

        for i in 0..self.test_runs.len() {
            if self.test_runs[i].completed() {
                continue;
            }

            let attempt = self.test_runs[i]
                .latest_attempt_mut()
                .expect("launched test run has at least one attempt");
            let task_id = attempt.task_id().clone();
            attempt
                .fetch_results(client, store)
                .await
                .map_err(|err| WaitError::Poll {
                    task_id: task_id.clone(),
                    err,
                })?;

            if !self.test_runs[i].completed() {
                complete = false;
                continue;
            }

            {
                let test_run = &self.test_runs[i];
                let latest = test_run
                    .latest_attempt()
                    .expect("completed test run has at least one attempt");
                debug!(
                    task_id = %task_id,
                    test = test_run.name(),
                    verdict = %latest.verdict(),
                    "task completed"
                );
            }

            if self.should_retry(&self.test_runs[i])? {
                complete = false;
                debug!(test = self.test_runs[i].name(), "retrying");
                self.test_runs[i]
                    .launch_attempt(client, builder, &self.params)
                    .await
                    .map_err(|err| WaitError::Retry { err })?;
                self.retries_used += 1;
            } else {
                debug!(test = self.test_runs[i].name(), "not retrying");
            }
        }

        Ok(complete)
    }

    /// Decides whether the given test run's latest attempt warrants a retry.
    fn should_retry(&self, test_run: &TestRun) -> Result<bool, WaitError> {
        let Some(latest) = test_run.latest_attempt() else {
            return Err(WaitError::RetryWithoutAttempt {
                name: test_run.name().to_owned(),
            });
        };
        if self.global_retries_remaining() == 0 || test_run.attempts_remaining() == 0 {
            return Ok(false);
        }
        match latest.verdict() {
            Verdict::Unspecified | Verdict::Failed => Ok(true),
            Verdict::NoVerdict | Verdict::Passed => Ok(false),
            verdict @ Verdict::PassedOnRetry => Err(WaitError::UnexpectedVerdict {
                name: test_run.name().to_owned(),
                verdict,
            }),
        }
    }

    fn global_retries_remaining(&self) -> u32 {
        self.global_max_retries.saturating_sub(self.retries_used)
    }

    /// The aggregate verdict across all test runs. [`Verdict::Unspecified`]
    /// until the set completes.
    pub fn verdict(&self) -> Verdict {
        if !self.complete {
            return Verdict::Unspecified;
        }
        if self.test_runs.iter().any(|run| run.verdict().is_failure()) {
            Verdict::Failed
        } else {
            Verdict::Passed
        }
    }

    /// The task set's own coarse lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.complete {
            Lifecycle::Completed
        } else if self.running {
            Lifecycle::Running
        } else {
            // Stopped mid-flight due to an error or cancellation.
            Lifecycle::Aborted
        }
    }

    /// Aggregate counters for the current state of the set.
    pub fn run_stats(&self) -> RunStats {
        let mut stats = RunStats {
            initial_task_count: self.test_runs.len(),
            retries_used: self.retries_used as usize,
            ..RunStats::default()
        };
        for test_run in &self.test_runs {
            if !test_run.runnable() {
                stats.finished_count += 1;
                stats.rejected += 1;
                continue;
            }
            if !test_run.completed() {
                continue;
            }
            stats.finished_count += 1;
            match test_run.verdict() {
                Verdict::Passed => stats.passed += 1,
                Verdict::PassedOnRetry => {
                    stats.passed += 1;
                    stats.passed_on_retry += 1;
                }
                Verdict::NoVerdict => stats.no_verdict += 1,
                Verdict::Failed | Verdict::Unspecified => stats.failed += 1,
            }
        }
        stats
    }

    /// Renders the aggregated report from the task set's current state.
    ///
    /// Callable at any point; mid-flight or aborted sets render whatever
    /// subset of results they reached.
    pub fn response(&self, urler: &impl TaskUrler) -> ExecuteReport {
        ExecuteReport {
            run_id: self.run_id,
            start_time: self.stopwatch.start_time(),
            elapsed: self.stopwatch.elapsed(),
            state: TaskSetState {
                life_cycle: self.lifecycle(),
                verdict: self.verdict(),
            },
            task_results: self
                .test_runs
                .iter()
                .flat_map(|run| run.task_results(urler))
                .collect(),
        }
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Aggregate counters for a task set.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    /// The number of tests in the set.
    pub initial_task_count: usize,

    /// Tests with nothing left to do, including rejected ones.
    pub finished_count: usize,

    /// Tests that passed, including passes on retry.
    pub passed: usize,

    /// Tests that passed only after at least one failing attempt.
    pub passed_on_retry: usize,

    /// Tests whose attempts produced no verdict.
    pub no_verdict: usize,

    /// Tests that failed.
    pub failed: usize,

    /// Tests rejected for unsatisfiable dependencies.
    pub rejected: usize,

    /// Retries launched across the whole set.
    pub retries_used: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success: every test finished
    /// and none failed or was rejected.
    pub fn is_success(&self) -> bool {
        if self.finished_count < self.initial_task_count {
            return false;
        }
        self.failed == 0 && self.rejected == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        results::{CaseOutcome, HarnessResult, TestCaseResult},
        runner::Attempt,
        spec::ExecutionEnvironment,
    };

    fn spec(name: &str, allow_retries: bool, max_retries: u32) -> TestSpec {
        TestSpec {
            name: name.into(),
            dependency_labels: Vec::new(),
            execution_environment: ExecutionEnvironment::Server,
            allow_retries,
            max_retries,
        }
    }

    fn params(allow_retries: bool, max_retries: u32) -> ExecutionParams {
        ExecutionParams {
            allow_retries,
            max_retries,
            task_timeout: Duration::from_secs(60),
            deadline: None,
        }
    }

    fn attempt_with(outcome: CaseOutcome) -> Attempt {
        Attempt::completed_with(HarnessResult {
            incomplete: false,
            test_cases: vec![TestCaseResult {
                name: "case".into(),
                outcome,
            }],
        })
    }

    #[test]
    fn new_task_set_is_running_and_unspecified() {
        let task_set = TaskSet::new(vec![spec("t", false, 0)], params(false, 0));
        assert!(task_set.running());
        assert!(!task_set.complete());
        assert_eq!(task_set.lifecycle(), Lifecycle::Running);
        assert_eq!(task_set.verdict(), Verdict::Unspecified);
    }

    #[test]
    fn should_retry_requires_an_attempt() {
        let task_set = TaskSet::new(vec![spec("t", true, 1)], params(true, 1));
        let err = task_set.should_retry(&task_set.test_runs[0]).unwrap_err();
        assert!(matches!(err, WaitError::RetryWithoutAttempt { .. }));
    }

    #[test]
    fn exhausted_global_budget_blocks_retry() {
        // Attempts remain for the test itself, but the global budget is
        // spent.
        let mut task_set = TaskSet::new(vec![spec("t", true, 1)], params(false, 0));
        task_set.test_runs[0].push_attempt(attempt_with(CaseOutcome::Fail));
        assert_eq!(task_set.test_runs[0].attempts_remaining(), 1);
        assert!(!task_set.should_retry(&task_set.test_runs[0]).unwrap());
    }

    #[test]
    fn exhausted_per_test_attempts_block_retry() {
        let mut task_set = TaskSet::new(vec![spec("t", false, 0)], params(true, 5));
        task_set.test_runs[0].push_attempt(attempt_with(CaseOutcome::Fail));
        assert_eq!(task_set.test_runs[0].attempts_remaining(), 0);
        assert!(!task_set.should_retry(&task_set.test_runs[0]).unwrap());
    }

    #[test]
    fn retry_decision_follows_the_latest_verdict() {
        let cases = [
            (attempt_with(CaseOutcome::Fail), true),
            (Attempt::unfinished(), true),
            (attempt_with(CaseOutcome::Pass), false),
            (Attempt::completed_with(HarnessResult::default()), false),
        ];
        for (attempt, expected) in cases {
            let mut task_set = TaskSet::new(vec![spec("t", true, 1)], params(true, 1));
            task_set.test_runs[0].push_attempt(attempt);
            assert_eq!(
                task_set.should_retry(&task_set.test_runs[0]).unwrap(),
                expected,
            );
        }
    }

    #[test]
    fn aggregate_verdict_accepts_no_verdict_runs() {
        let mut task_set = TaskSet::new(
            vec![spec("a", false, 0), spec("b", false, 0)],
            params(false, 0),
        );
        task_set.test_runs[0].push_attempt(attempt_with(CaseOutcome::Pass));
        task_set.test_runs[1].push_attempt(Attempt::completed_with(HarnessResult::default()));
        task_set.complete = true;
        assert_eq!(task_set.verdict(), Verdict::Passed);
    }

    #[test]
    fn aggregate_verdict_fails_on_any_failure() {
        let mut task_set = TaskSet::new(
            vec![spec("a", false, 0), spec("b", false, 0)],
            params(false, 0),
        );
        task_set.test_runs[0].push_attempt(attempt_with(CaseOutcome::Pass));
        task_set.test_runs[1].push_attempt(attempt_with(CaseOutcome::Fail));
        task_set.complete = true;
        assert_eq!(task_set.verdict(), Verdict::Failed);
    }

    #[test]
    fn stats_success_truth_table() {
        assert!(RunStats::default().is_success(), "empty run is a success");
        assert!(
            RunStats {
                initial_task_count: 3,
                finished_count: 3,
                passed: 3,
                ..RunStats::default()
            }
            .is_success(),
        );
        assert!(
            !RunStats {
                initial_task_count: 3,
                finished_count: 2,
                ..RunStats::default()
            }
            .is_success(),
            "unfinished tests fail the run",
        );
        assert!(
            !RunStats {
                initial_task_count: 3,
                finished_count: 3,
                failed: 1,
                ..RunStats::default()
            }
            .is_success(),
        );
        assert!(
            !RunStats {
                initial_task_count: 3,
                finished_count: 3,
                rejected: 1,
                ..RunStats::default()
            }
            .is_success(),
            "rejected tests fail the run",
        );
        assert!(
            RunStats {
                initial_task_count: 3,
                finished_count: 3,
                no_verdict: 3,
                ..RunStats::default()
            }
            .is_success(),
            "no-verdict tests do not fail the run",
        );
    }
}
