// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the `gol.v1` package and domain ↔ proto conversions.

use crate::board::Board;
use crate::error::ErrorCode;
use crate::state::RunState;

/// Generated protobuf types for the `gol.v1` package.
pub mod proto {
    tonic::include_proto!("gol.v1");
}

/// Convert a domain [`Board`] to the wire matrix.
pub fn board_to_proto(board: &Board) -> proto::BoardMatrix {
    proto::BoardMatrix {
        height: board.height() as u32,
        width: board.width() as u32,
        cells: board.cells().to_vec(),
    }
}

/// Validate a wire matrix into a domain [`Board`].
///
/// Dimension or cell-value violations are protocol errors and map to
/// `INVALID_ARGUMENT`.
pub fn board_from_proto(matrix: &proto::BoardMatrix) -> Result<Board, tonic::Status> {
    Board::from_cells(matrix.height as usize, matrix.width as usize, matrix.cells.clone())
        .map_err(|e| ErrorCode::Protocol.to_grpc_status(e.to_string()))
}

/// Convert a domain [`RunState`] to the wire enum.
pub fn run_state_to_proto(state: RunState) -> proto::RunState {
    match state {
        RunState::Running => proto::RunState::Running,
        RunState::Pausing => proto::RunState::Pausing,
        RunState::Quitting => proto::RunState::Quitting,
        RunState::Killing => proto::RunState::Killing,
    }
}

/// Parse the wire enum; `RUN_STATE_UNSPECIFIED` is a protocol error.
pub fn run_state_from_proto(state: proto::RunState) -> Result<RunState, tonic::Status> {
    match state {
        proto::RunState::Running => Ok(RunState::Running),
        proto::RunState::Pausing => Ok(RunState::Pausing),
        proto::RunState::Quitting => Ok(RunState::Quitting),
        proto::RunState::Killing => Ok(RunState::Killing),
        proto::RunState::Unspecified => {
            Err(ErrorCode::Protocol.to_grpc_status("run state must be specified"))
        }
    }
}

/// Which boundary row a neighbour is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEdge {
    Top,
    Bottom,
}

impl RowEdge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

/// Parse the wire edge; anything but TOP/BOTTOM is a protocol error fatal
/// to the call.
pub fn row_edge_from_proto(edge: proto::RowEdge) -> Result<RowEdge, tonic::Status> {
    match edge {
        proto::RowEdge::Top => Ok(RowEdge::Top),
        proto::RowEdge::Bottom => Ok(RowEdge::Bottom),
        proto::RowEdge::Unspecified => {
            Err(ErrorCode::Protocol.to_grpc_status("row edge must be TOP or BOTTOM"))
        }
    }
}

pub fn row_edge_to_proto(edge: RowEdge) -> proto::RowEdge {
    match edge {
        RowEdge::Top => proto::RowEdge::Top,
        RowEdge::Bottom => proto::RowEdge::Bottom,
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
