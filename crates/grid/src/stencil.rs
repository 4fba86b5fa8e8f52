// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Life update rule over one strip.
//!
//! Vertical neighbours at the strip edges come from halo rows owned by the
//! ring neighbours; the x axis wraps modulo the board width. The full-board
//! step is the same computation with the board's own wrap rows as halos,
//! which keeps a single implementation of the rule.

use crate::board::{Board, ALIVE, DEAD};

/// Advance one strip a single generation.
///
/// `top_halo` is the row directly above the strip (the above-neighbour's
/// bottom row), `bottom_halo` the row directly below. Both must match the
/// strip width. `threads` is a parallelism hint; row ranges are split across
/// that many compute threads when the strip is tall enough to bother.
pub fn step_strip(strip: &Board, top_halo: &[u8], bottom_halo: &[u8], threads: usize) -> Board {
    let height = strip.height();
    let width = strip.width();
    let mut next = vec![DEAD; height * width];

    let threads = effective_threads(threads, height);
    if threads <= 1 {
        step_rows(strip, top_halo, bottom_halo, 0, &mut next);
    } else {
        let rows_per = height.div_ceil(threads);
        std::thread::scope(|scope| {
            for (chunk_index, chunk) in next.chunks_mut(rows_per * width).enumerate() {
                let start_row = chunk_index * rows_per;
                scope.spawn(move || {
                    step_rows(strip, top_halo, bottom_halo, start_row, chunk);
                });
            }
        });
    }

    Board::from_computed(height, width, next)
}

/// Advance a full board one generation with toroidal wrap on both axes.
pub fn step_board(board: &Board) -> Board {
    let top_halo = board.bottom_row();
    let bottom_halo = board.top_row();
    step_strip(board, &top_halo, &bottom_halo, 1)
}

/// Clamp the thread hint to something worth spawning for.
fn effective_threads(threads: usize, height: usize) -> usize {
    threads.max(1).min(height)
}

/// Compute rows `[start_row, start_row + out.len() / width)` of the next
/// generation into `out`.
fn step_rows(strip: &Board, top_halo: &[u8], bottom_halo: &[u8], start_row: usize, out: &mut [u8]) {
    let height = strip.height();
    let width = strip.width();
    let rows = out.len() / width;

    for local in 0..rows {
        let y = start_row + local;
        let above: &[u8] = if y == 0 { top_halo } else { strip.row(y - 1) };
        let here = strip.row(y);
        let below: &[u8] = if y == height - 1 { bottom_halo } else { strip.row(y + 1) };

        for x in 0..width {
            let mut alive_neighbours = 0u8;
            for row in [above, here, below] {
                for dx in [width - 1, 0, 1] {
                    if row[(x + dx) % width] == ALIVE {
                        alive_neighbours += 1;
                    }
                }
            }
            // The centre cell was counted with its neighbours above.
            if here[x] == ALIVE {
                alive_neighbours -= 1;
            }

            out[local * width + x] = match (here[x], alive_neighbours) {
                (ALIVE, n) if n < 2 => DEAD,
                (ALIVE, n) if n > 3 => DEAD,
                (DEAD, 3) => ALIVE,
                (cell, _) => cell,
            };
        }
    }
}

#[cfg(test)]
#[path = "stencil_tests.rs"]
mod tests;
