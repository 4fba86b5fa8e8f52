// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Horizontal strip partitioning and reassembly.
//!
//! Strips partition `[0, H)` exactly, in worker ring order, with heights
//! differing by at most one row; the remainder of an uneven split goes to
//! the first strips.

use crate::board::{Board, BoardError};

/// One worker's owned row range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripRange {
    pub start: usize,
    pub end: usize,
}

impl StripRange {
    pub fn height(&self) -> usize {
        self.end - self.start
    }
}

/// Number of workers actually used for a board of `height` rows.
///
/// A deployment may carry more workers than the board has rows; the ring is
/// then formed over the first `height` workers so no strip is empty.
pub fn active_workers(height: usize, deployed: usize) -> usize {
    deployed.min(height).max(1)
}

/// Split `height` rows across `workers` strips.
///
/// Callers pass `workers <= height` (see [`active_workers`]); strip 0 starts
/// at row 0 and heights differ by at most one.
pub fn strip_ranges(height: usize, workers: usize) -> Vec<StripRange> {
    let base = height / workers;
    let remainder = height % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for index in 0..workers {
        let rows = if index < remainder { base + 1 } else { base };
        ranges.push(StripRange { start, end: start + rows });
        start += rows;
    }
    ranges
}

/// Stitch per-worker strips back into a full board, in worker-index order.
pub fn reassemble(strips: &[Board]) -> Result<Board, BoardError> {
    let width = strips.first().map(Board::width).unwrap_or(0);
    let height: usize = strips.iter().map(Board::height).sum();

    let mut cells = Vec::with_capacity(height * width);
    for strip in strips {
        if strip.width() != width {
            return Err(BoardError::SizeMismatch {
                expected: width,
                actual: strip.width(),
            });
        }
        cells.extend_from_slice(strip.cells());
    }
    Board::from_cells(height, width, cells)
}

#[cfg(test)]
#[path = "partition_tests.rs"]
mod tests;
