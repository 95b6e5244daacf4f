// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core orchestration for fleetrun.
//!
//! The entry point is [`runner::TaskSet`]: built from a list of
//! [`spec::TestSpec`]s and shared [`spec::ExecutionParams`], it launches one
//! remote task per runnable test, polls the backend until every test settles
//! (retrying failed attempts within the configured budgets), and renders an
//! aggregated [`ExecuteReport`](fleetrun_metadata::ExecuteReport).
//!
//! The remote backend, the content-addressed result store, and the
//! launch-argument builder are collaborators implemented by the caller; see
//! [`backend`], [`results`], and [`request`] for their contracts.

pub mod backend;
pub mod cancel;
pub mod errors;
pub mod request;
pub mod results;
pub mod runner;
pub mod spec;
pub mod task_state;
mod time;
