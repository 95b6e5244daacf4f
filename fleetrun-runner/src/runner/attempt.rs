// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    backend::{RawTaskResult, RemoteClient, TaskId},
    errors::FetchResultsError,
    results::{self, CaseOutcome, HarnessResult, ResultStore},
    task_state::RemoteTaskState,
};
use fleetrun_metadata::Verdict;
use tracing::debug;

/// One remote execution instance of a test.
///
/// The task id is assigned at launch and never changes; the state is updated
/// only by the poll step; the result is recorded once the task reaches a
/// terminal state. The verdict is derived from the result on demand, never
/// stored.
#[derive(Clone, Debug)]
pub struct Attempt {
    task_id: TaskId,
    state: RemoteTaskState,
    result: Option<HarnessResult>,
}

impl Attempt {
    pub(crate) fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: RemoteTaskState::Pending,
            result: None,
        }
    }

    /// The remote task id assigned at launch.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// The most recently observed task state.
    pub fn state(&self) -> RemoteTaskState {
        self.state
    }

    /// Whether this attempt has finished and recorded a result.
    pub fn completed(&self) -> bool {
        self.result.is_some()
    }

    /// Fetches the task's current backend state and, if the task reached a
    /// terminal state, records its result.
    ///
    /// A task that ran to completion gets its result artifact fetched and
    /// decoded; any failure there is downgraded to the incomplete marker. A
    /// task that terminated without completing records the incomplete marker
    /// directly. An unfinished task is left untouched this tick.
    pub(crate) async fn fetch_results<C: RemoteClient, S: ResultStore>(
        &mut self,
        client: &C,
        store: &S,
    ) -> Result<(), FetchResultsError> {
        let answers = client
            .get_results(std::slice::from_ref(&self.task_id))
            .await
            .map_err(|err| FetchResultsError::GetResults {
                task_id: self.task_id.clone(),
                err,
            })?;
        let raw = unpack_result(answers, &self.task_id)?;
        let state: RemoteTaskState = raw.state.parse()?;
        self.state = state;

        if state.ran_to_completion() {
            match results::fetch_harness_result(store, &raw).await {
                Ok(result) => self.result = Some(result),
                Err(err) => {
                    debug!(
                        task_id = %self.task_id,
                        %err,
                        "failed to fetch harness result, treating as incomplete"
                    );
                    self.result = Some(HarnessResult::incomplete_marker());
                }
            }
        } else if !state.is_unfinished() {
            self.result = Some(HarnessResult::incomplete_marker());
        }
        Ok(())
    }

    /// Flattens the decoded test cases into one verdict for this attempt.
    pub fn verdict(&self) -> Verdict {
        let Some(result) = &self.result else {
            return Verdict::Unspecified;
        };
        if result.incomplete {
            return Verdict::Failed;
        }
        // Zero judged cases means there is no verdict at all.
        let mut verdict = Verdict::NoVerdict;
        for case in &result.test_cases {
            match case.outcome {
                // Any failing case settles the attempt.
                CaseOutcome::Fail => return Verdict::Failed,
                CaseOutcome::Pass => verdict = Verdict::Passed,
                CaseOutcome::Undefined => {}
            }
        }
        verdict
    }

    #[cfg(test)]
    pub(crate) fn completed_with(result: HarnessResult) -> Self {
        Self {
            task_id: TaskId::new("test-task"),
            state: RemoteTaskState::Completed,
            result: Some(result),
        }
    }

    #[cfg(test)]
    pub(crate) fn unfinished() -> Self {
        Self::new(TaskId::new("test-task"))
    }
}

fn unpack_result(
    answers: Vec<RawTaskResult>,
    task_id: &TaskId,
) -> Result<RawTaskResult, FetchResultsError> {
    if answers.len() != 1 {
        return Err(FetchResultsError::ResultCount {
            task_id: task_id.clone(),
            count: answers.len(),
        });
    }
    let result = answers.into_iter().next().expect("length checked above");
    if result.task_id != *task_id {
        return Err(FetchResultsError::ResultMismatch {
            task_id: task_id.clone(),
            actual: result.task_id,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::TestCaseResult;

    fn case(name: &str, outcome: CaseOutcome) -> TestCaseResult {
        TestCaseResult {
            name: name.into(),
            outcome,
        }
    }

    #[test]
    fn unfinished_attempt_has_no_verdict() {
        let attempt = Attempt::unfinished();
        assert!(!attempt.completed());
        assert_eq!(attempt.verdict(), Verdict::Unspecified);
    }

    #[test]
    fn incomplete_result_is_a_failure() {
        let attempt = Attempt::completed_with(HarnessResult::incomplete_marker());
        assert_eq!(attempt.verdict(), Verdict::Failed);
    }

    #[test]
    fn any_failing_case_fails_the_attempt() {
        let attempt = Attempt::completed_with(HarnessResult {
            incomplete: false,
            test_cases: vec![
                case("a", CaseOutcome::Pass),
                case("b", CaseOutcome::Fail),
                case("c", CaseOutcome::Pass),
            ],
        });
        assert_eq!(attempt.verdict(), Verdict::Failed);
    }

    #[test]
    fn passing_cases_pass_the_attempt() {
        let attempt = Attempt::completed_with(HarnessResult {
            incomplete: false,
            test_cases: vec![case("a", CaseOutcome::Undefined), case("b", CaseOutcome::Pass)],
        });
        assert_eq!(attempt.verdict(), Verdict::Passed);
    }

    #[test]
    fn no_judged_cases_means_no_verdict() {
        let empty = Attempt::completed_with(HarnessResult::default());
        assert_eq!(empty.verdict(), Verdict::NoVerdict);

        let undefined_only = Attempt::completed_with(HarnessResult {
            incomplete: false,
            test_cases: vec![case("a", CaseOutcome::Undefined)],
        });
        assert_eq!(undefined_only.verdict(), Verdict::NoVerdict);
    }

    #[test]
    fn verdict_is_idempotent() {
        let attempt = Attempt::completed_with(HarnessResult {
            incomplete: false,
            test_cases: vec![case("a", CaseOutcome::Pass)],
        });
        assert_eq!(attempt.verdict(), attempt.verdict());
    }

    #[test]
    fn unpack_rejects_wrong_answers() {
        let id = TaskId::new("task1");
        let err = unpack_result(Vec::new(), &id).unwrap_err();
        assert!(matches!(err, FetchResultsError::ResultCount { count: 0, .. }));

        let other = RawTaskResult {
            task_id: TaskId::new("task2"),
            state: "COMPLETED".to_owned(),
            outputs_ref: None,
        };
        let err = unpack_result(vec![other], &id).unwrap_err();
        assert!(matches!(err, FetchResultsError::ResultMismatch { .. }));
    }
}
