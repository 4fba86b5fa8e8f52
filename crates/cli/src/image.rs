// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw board images on disk.
//!
//! The format is a headerless byte matrix: `height * width` bytes,
//! row-major, one byte per cell. The initial board is loaded from
//! `WIDTHxHEIGHT`; results are written as `WIDTHxHEIGHTxTURN`.

use std::path::Path;

use anyhow::Context;

use golgrid::board::Board;

/// Load the initial board for the given dimensions.
pub fn load(dir: &Path, width: u32, height: u32) -> anyhow::Result<Board> {
    let path = dir.join(format!("{width}x{height}"));
    let bytes = std::fs::read(&path)
        .with_context(|| format!("reading initial board {}", path.display()))?;
    Board::from_cells(height as usize, width as usize, bytes)
        .with_context(|| format!("initial board {}", path.display()))
}

/// Write a board at `turn`, returning the filename.
pub fn save(dir: &Path, board: &Board, turn: u64) -> anyhow::Result<String> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating image directory {}", dir.display()))?;
    let filename = format!("{}x{}x{turn}", board.width(), board.height());
    let path = dir.join(&filename);
    std::fs::write(&path, board.cells())
        .with_context(|| format!("writing board {}", path.display()))?;
    Ok(filename)
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
