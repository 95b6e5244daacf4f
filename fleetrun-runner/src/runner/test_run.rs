// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    backend::{RemoteClient, TaskUrler},
    errors::LaunchError,
    request::RequestBuilder,
    runner::Attempt,
    spec::{ExecutionParams, TestSpec},
};
use fleetrun_metadata::{Lifecycle, TaskResultSummary, Verdict};
use tracing::info;

/// One logical test: an append-only, strictly ordered sequence of attempts
/// under a per-test attempt cap.
///
/// Attempt *k* is only launched after attempt *k - 1* has completed; no two
/// attempts of the same test are ever in flight concurrently.
#[derive(Clone, Debug)]
pub struct TestRun {
    spec: TestSpec,
    max_attempts: u32,
    runnable: bool,
    attempts: Vec<Attempt>,
}

impl TestRun {
    pub(crate) fn new(spec: TestSpec) -> Self {
        let max_attempts = spec.retry_cap().saturating_add(1);
        Self {
            spec,
            max_attempts,
            runnable: true,
            attempts: Vec::new(),
        }
    }

    /// The test's name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The attempts launched so far, oldest first.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// How many more attempts this test may launch.
    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts.len() as u32)
    }

    /// Whether at least one attempt has been launched.
    pub fn attempted_at_least_once(&self) -> bool {
        !self.attempts.is_empty()
    }

    /// Whether this test can run at all. False means the test was rejected
    /// during dependency validation and has zero attempts.
    pub fn runnable(&self) -> bool {
        self.runnable
    }

    /// Checks whether any live executor satisfies this test's static
    /// dependency labels.
    ///
    /// Does not mutate the test run; the caller decides what to do with the
    /// answer. Errors abort the whole launch phase.
    pub(crate) async fn validate_dependencies<C, B>(
        &self,
        client: &C,
        builder: &B,
        params: &ExecutionParams,
    ) -> Result<bool, LaunchError>
    where
        C: RemoteClient,
        B: RequestBuilder,
    {
        let dimensions = builder
            .static_dimensions(&self.spec, params)
            .map_err(|err| LaunchError::StaticDimensions {
                name: self.spec.name.to_string(),
                err,
            })?;
        client
            .bot_exists(&dimensions)
            .await
            .map_err(|err| LaunchError::BotExists {
                name: self.spec.name.to_string(),
                err,
            })
    }

    /// Marks this test as unable to run. The test run is completed with zero
    /// attempts and reports a rejected outcome.
    pub(crate) fn mark_not_runnable(&mut self) {
        self.runnable = false;
    }

    /// Builds launch arguments and creates one new remote attempt.
    pub(crate) async fn launch_attempt<C, B>(
        &mut self,
        client: &C,
        builder: &B,
        params: &ExecutionParams,
    ) -> Result<(), LaunchError>
    where
        C: RemoteClient,
        B: RequestBuilder,
    {
        let request =
            builder
                .task_request(&self.spec, params)
                .map_err(|err| LaunchError::BuildRequest {
                    name: self.spec.name.to_string(),
                    err,
                })?;
        let task_id =
            client
                .create_task(&request)
                .await
                .map_err(|err| LaunchError::CreateTask {
                    name: self.spec.name.to_string(),
                    err,
                })?;
        info!(
            test = %self.spec.name,
            url = %client.task_url(&task_id),
            "launched attempt"
        );
        self.attempts.push(Attempt::new(task_id));
        Ok(())
    }

    /// The most recently launched attempt.
    pub fn latest_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub(crate) fn latest_attempt_mut(&mut self) -> Option<&mut Attempt> {
        self.attempts.last_mut()
    }

    /// Whether there is nothing left to do for this test: it is not runnable,
    /// or its latest attempt has completed.
    pub fn completed(&self) -> bool {
        if !self.runnable {
            return true;
        }
        self.latest_attempt().is_some_and(Attempt::completed)
    }

    /// Folds the attempt history into one verdict for the test.
    ///
    /// The scan runs oldest to newest. An attempt with no verdict settles the
    /// whole test immediately: a test that produced no cases is never
    /// reported as passed or failed on the strength of a later retry.
    pub fn verdict(&self) -> Verdict {
        if !self.runnable {
            return Verdict::Unspecified;
        }
        let mut failed_earlier = false;
        for attempt in &self.attempts {
            match attempt.verdict() {
                Verdict::NoVerdict => return Verdict::NoVerdict,
                Verdict::Passed if failed_earlier => return Verdict::PassedOnRetry,
                Verdict::Passed => return Verdict::Passed,
                _ => failed_earlier = true,
            }
        }
        Verdict::Failed
    }

    /// Renders one report entry per attempt, or a single synthetic rejected
    /// entry for a test that never launched.
    pub(crate) fn task_results(&self, urler: &impl TaskUrler) -> Vec<TaskResultSummary> {
        if !self.runnable {
            return vec![TaskResultSummary {
                name: self.spec.name.clone(),
                attempt: 0,
                task_url: None,
                life_cycle: Lifecycle::Rejected,
                verdict: Verdict::Unspecified,
            }];
        }
        self.attempts
            .iter()
            .enumerate()
            .map(|(index, attempt)| TaskResultSummary {
                name: self.spec.name.clone(),
                attempt: index as u32,
                task_url: Some(urler.task_url(attempt.task_id())),
                life_cycle: attempt.state().lifecycle(),
                verdict: attempt.verdict(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn push_attempt(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }
}
