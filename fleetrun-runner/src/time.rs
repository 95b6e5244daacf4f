// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking how long a task set runs.
//!
//! Reports need a wall-clock start time and a duration. For that we pair a
//! realtime clock reading with a monotonic one; elapsed time always comes
//! from the monotonic clock.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Utc>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            // These two reads happen imperceptibly close to each other, which
            // is good enough for our purposes.
            start_time: Utc::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }
}
