// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed event stream the controller emits to its consumer.
//!
//! Within a turn, every `CellFlipped` for turn t precedes `TurnComplete(t)`.
//! The stream closes after `StateChange(Quitting)`.

use serde::{Deserialize, Serialize};

use golgrid::board::Cell;

/// Visible execution state reported on the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    Executing,
    Paused,
    Quitting,
}

impl ExecState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executing => "executing",
            Self::Paused => "paused",
            Self::Quitting => "quitting",
        }
    }
}

/// Events emitted by the controller, tagged with the completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A cell changed value between the previous known board and turn `turn`.
    CellFlipped { turn: u64, cell: Cell },
    /// All flips for `turn` have been emitted.
    TurnComplete { turn: u64 },
    /// Periodic live-cell count from the snapshot ticker.
    AliveCellsCount { turn: u64, count: u64 },
    /// A board image was written to disk.
    ImageOutputComplete { turn: u64, filename: String },
    /// The run changed execution state.
    StateChange { turn: u64, state: ExecState },
    /// The run finished; `alive` lists every live cell of the final board.
    FinalTurnComplete { turn: u64, alive: Vec<Cell> },
}

impl Event {
    /// The completed turn this event is tagged with.
    pub fn turn(&self) -> u64 {
        match self {
            Self::CellFlipped { turn, .. }
            | Self::TurnComplete { turn }
            | Self::AliveCellsCount { turn, .. }
            | Self::ImageOutputComplete { turn, .. }
            | Self::StateChange { turn, .. }
            | Self::FinalTurnComplete { turn, .. } => *turn,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
