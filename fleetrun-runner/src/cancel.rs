// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cancellation plumbing for a task set run.
//!
//! The caller holds a [`CancellationHandle`] and hands the matching
//! [`CancelWatcher`] to [`TaskSet::launch_and_wait`]. Cancellation aborts an
//! in-flight inter-tick sleep immediately and is checked before each poll
//! tick; it does not abort an RPC that has already been issued.
//!
//! [`TaskSet::launch_and_wait`]: crate::runner::TaskSet::launch_and_wait

use std::{fmt, future};
use tokio::sync::watch;

/// Why a task set run was cancelled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// The caller asked for the run to stop.
    Interrupt,

    /// The overall deadline expired.
    DeadlineExceeded,
}

impl CancelReason {
    pub(crate) fn to_static_str(self) -> &'static str {
        match self {
            CancelReason::Interrupt => "interrupt",
            CancelReason::DeadlineExceeded => "deadline exceeded",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_static_str())
    }
}

/// Creates a connected cancellation handle/watcher pair.
pub fn cancellation() -> (CancellationHandle, CancelWatcher) {
    let (sender, receiver) = watch::channel(None);
    (
        CancellationHandle { sender },
        CancelWatcher {
            receiver: Some(receiver),
        },
    )
}

/// The caller-held side of a cancellation pair.
#[derive(Debug)]
pub struct CancellationHandle {
    sender: watch::Sender<Option<CancelReason>>,
}

impl CancellationHandle {
    /// Signals cancellation. The first reason wins; later calls have no
    /// effect.
    pub fn cancel(&self, reason: CancelReason) {
        self.sender.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

/// The watcher side of a cancellation pair, polled by the orchestrator.
#[derive(Debug)]
pub struct CancelWatcher {
    receiver: Option<watch::Receiver<Option<CancelReason>>>,
}

impl CancelWatcher {
    /// A watcher that never fires, for callers that always run to
    /// completion.
    pub fn noop() -> Self {
        Self { receiver: None }
    }

    /// Returns the cancellation reason if cancellation has been signalled.
    pub(crate) fn check(&self) -> Option<CancelReason> {
        self.receiver.as_ref().and_then(|receiver| *receiver.borrow())
    }

    /// Resolves once cancellation is signalled. Never resolves for a noop
    /// watcher, or when the handle is dropped without cancelling.
    pub(crate) async fn cancelled(&mut self) -> CancelReason {
        let Some(receiver) = &mut self.receiver else {
            return future::pending().await;
        };
        loop {
            if let Some(reason) = *receiver.borrow_and_update() {
                return reason;
            }
            if receiver.changed().await.is_err() {
                return future::pending().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_reason_wins() {
        let (handle, mut watcher) = cancellation();
        assert_eq!(watcher.check(), None);

        handle.cancel(CancelReason::Interrupt);
        handle.cancel(CancelReason::DeadlineExceeded);

        assert_eq!(watcher.check(), Some(CancelReason::Interrupt));
        assert_eq!(watcher.cancelled().await, CancelReason::Interrupt);
    }

    #[tokio::test]
    async fn noop_watcher_never_fires() {
        let mut watcher = CancelWatcher::noop();
        assert_eq!(watcher.check(), None);

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            watcher.cancelled(),
        )
        .await;
        assert!(result.is_err(), "noop watcher must not resolve");
    }
}
