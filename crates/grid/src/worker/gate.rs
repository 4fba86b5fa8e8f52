// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-direction row-serving gate.
//!
//! Each worker owns two of these, one per boundary row. A gate is a
//! rearmable one-shot: armed with the committed generation's row, taken
//! exactly once by the matching neighbour request, and rearmed only after
//! the next generation commits.
//!
//! States: `NotReady` (no simulation yet, so a taker blocks), `Armed` (row
//! available), `Served` (taken this generation; a second take is a
//! protocol error), and `Closed` (job stopped, takers fail fast).

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// The row was already served this generation.
    AlreadyServed,
    /// The job stopped; no further rows will be armed.
    Closed,
}

enum GateState {
    NotReady,
    Armed(Vec<u8>),
    Served,
    Closed,
}

pub struct RowGate {
    state: Mutex<GateState>,
    armed: Notify,
    served: Notify,
}

impl RowGate {
    pub fn new() -> Self {
        Self { state: Mutex::new(GateState::NotReady), armed: Notify::new(), served: Notify::new() }
    }

    /// Publish the committed generation's row. Overwrites `Served` from the
    /// previous generation; a close is final and wins.
    pub fn arm(&self, row: Vec<u8>) {
        {
            let mut state = self.state.lock();
            if matches!(*state, GateState::Closed) {
                return;
            }
            *state = GateState::Armed(row);
        }
        self.armed.notify_waiters();
    }

    /// Stop the gate: pending and future takers fail with [`GateError::Closed`].
    pub fn close(&self) {
        *self.state.lock() = GateState::Closed;
        self.armed.notify_waiters();
        self.served.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), GateState::Closed)
    }

    /// Take the armed row, blocking while the gate is `NotReady`.
    pub async fn take(&self) -> Result<Vec<u8>, GateError> {
        loop {
            let notified = self.armed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.state.lock();
                match std::mem::replace(&mut *state, GateState::Served) {
                    GateState::Armed(row) => {
                        drop(state);
                        self.served.notify_waiters();
                        return Ok(row);
                    }
                    GateState::Served => return Err(GateError::AlreadyServed),
                    GateState::Closed => {
                        *state = GateState::Closed;
                        return Err(GateError::Closed);
                    }
                    GateState::NotReady => {
                        *state = GateState::NotReady;
                    }
                }
            }
            notified.await;
        }
    }

    /// Wait until the armed row has been taken (or the gate closed).
    pub async fn wait_served(&self) -> Result<(), GateError> {
        loop {
            let notified = self.served.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.state.lock();
                match *state {
                    GateState::Served => return Ok(()),
                    GateState::Closed => return Err(GateError::Closed),
                    GateState::Armed(_) | GateState::NotReady => {}
                }
            }
            notified.await;
        }
    }
}

impl Default for RowGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
