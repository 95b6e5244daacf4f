// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fetching and decoding harness results from content-addressed storage.
//!
//! A completed task leaves a single JSON result file at its output root; this
//! module owns the read contract for fetching that file and the decoded
//! shape. Fetch and decode failures are recoverable: the poll step downgrades
//! them to an incomplete result instead of aborting the run.

use crate::{
    backend::{OutputsRef, RawTaskResult},
    errors::{ResultFetchError, StoreError},
};
use serde::Deserialize;
use smol_str::SmolStr;

/// Name of the result file the remote harness writes at the output root.
pub const RESULT_FILE: &str = "harness_result.json";

/// Read contract for content-addressed result storage.
#[allow(async_fn_in_trait)]
pub trait ResultStore {
    /// Fetches a single file from the output tree behind `outputs_ref`.
    async fn get_file(
        &self,
        outputs_ref: &OutputsRef,
        filename: &str,
    ) -> Result<Vec<u8>, StoreError>;
}

/// Decoded result of one remote harness execution.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct HarnessResult {
    /// Set when the harness terminated before producing usable results.
    #[serde(default)]
    pub incomplete: bool,

    /// Outcome of each test case the harness ran.
    #[serde(default)]
    pub test_cases: Vec<TestCaseResult>,
}

impl HarnessResult {
    /// The marker recorded when a task finished without an obtainable,
    /// decodable result. Treated as a failed attempt.
    pub(crate) fn incomplete_marker() -> Self {
        Self {
            incomplete: true,
            test_cases: Vec::new(),
        }
    }
}

/// Outcome of a single test case.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct TestCaseResult {
    /// The case's name, as reported by the harness.
    pub name: SmolStr,

    /// The case's outcome.
    #[serde(default)]
    pub outcome: CaseOutcome,
}

/// Raw per-case outcome reported by the harness.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseOutcome {
    /// The harness recorded neither a pass nor a fail for the case.
    #[default]
    Undefined,

    /// The case passed.
    Pass,

    /// The case failed.
    Fail,
}

/// Fetches and decodes the harness result for a task that ran to completion.
pub(crate) async fn fetch_harness_result<S: ResultStore>(
    store: &S,
    raw: &RawTaskResult,
) -> Result<HarnessResult, ResultFetchError> {
    let outputs_ref = raw
        .outputs_ref
        .as_ref()
        .ok_or(ResultFetchError::MissingOutputsRef)?;
    let content = store.get_file(outputs_ref, RESULT_FILE).await?;
    Ok(serde_json::from_slice(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_full_result() {
        let content = indoc! {r#"
            {
              "incomplete": false,
              "test_cases": [
                {"name": "network.Ping.ipv4", "outcome": "PASS"},
                {"name": "network.Ping.ipv6", "outcome": "FAIL"},
                {"name": "network.Ping.setup", "outcome": "UNDEFINED"}
              ]
            }
        "#};
        let result: HarnessResult = serde_json::from_slice(content.as_bytes()).unwrap();
        assert_eq!(
            result,
            HarnessResult {
                incomplete: false,
                test_cases: vec![
                    TestCaseResult {
                        name: "network.Ping.ipv4".into(),
                        outcome: CaseOutcome::Pass,
                    },
                    TestCaseResult {
                        name: "network.Ping.ipv6".into(),
                        outcome: CaseOutcome::Fail,
                    },
                    TestCaseResult {
                        name: "network.Ping.setup".into(),
                        outcome: CaseOutcome::Undefined,
                    },
                ],
            }
        );
    }

    #[test]
    fn missing_fields_default() {
        let result: HarnessResult = serde_json::from_str("{}").unwrap();
        assert_eq!(result, HarnessResult::default());

        let result: HarnessResult =
            serde_json::from_str(r#"{"test_cases": [{"name": "a"}]}"#).unwrap();
        assert_eq!(result.test_cases[0].outcome, CaseOutcome::Undefined);
    }

    #[test]
    fn unknown_outcome_is_an_error() {
        let err =
            serde_json::from_str::<HarnessResult>(r#"{"test_cases": [{"name": "a", "outcome": "MAYBE"}]}"#)
                .unwrap_err();
        assert!(err.to_string().contains("unknown variant"), "{err}");
    }

    #[test]
    fn incomplete_marker_shape() {
        let marker = HarnessResult::incomplete_marker();
        assert!(marker.incomplete);
        assert!(marker.test_cases.is_empty());
    }
}
