// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The launch-argument builder collaborator.

use crate::{
    backend::{Dimension, TaskRequest},
    errors::RequestError,
    spec::{ExecutionParams, TestSpec},
};

/// Builds remote task creation requests from test specifications.
///
/// Implementations translate a test's dependency labels and execution
/// environment, plus the shared execution parameters, into the concrete
/// command line, dimensions, tags, and timeout of a [`TaskRequest`]. From the
/// orchestrator's perspective this is a pure function; validation failures
/// are fatal to the launch phase.
pub trait RequestBuilder {
    /// Returns the static dimensions used to check executor availability
    /// before launching the test.
    fn static_dimensions(
        &self,
        spec: &TestSpec,
        params: &ExecutionParams,
    ) -> Result<Vec<Dimension>, RequestError>;

    /// Produces the fully-formed creation request for one attempt of the
    /// test.
    fn task_request(
        &self,
        spec: &TestSpec,
        params: &ExecutionParams,
    ) -> Result<TaskRequest, RequestError>;
}
