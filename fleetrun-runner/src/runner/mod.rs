// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote test-set orchestration.
//!
//! The main structure in this module is [`TaskSet`]: it owns one [`TestRun`]
//! per requested test, each of which accumulates an append-only sequence of
//! [`Attempt`]s as the retry policy plays out.

mod attempt;
mod imp;
mod test_run;

pub use attempt::Attempt;
pub use imp::{RunStats, TaskSet};
pub use test_run::TestRun;
