// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the end-to-end scenario tests.

use std::path::Path;

use clap::Parser;
use tokio::sync::mpsc;

use gol::config::Config;
use gol::event::Event;
use golgrid::board::{Board, ALIVE, DEAD};
use golgrid::stencil::step_board;
use golgrid::test_support::{spawn_broker, spawn_worker_ring, SpawnedServer};

/// A full in-process cluster: worker ring plus broker.
pub struct Cluster {
    pub workers: Vec<SpawnedServer>,
    pub broker: SpawnedServer,
}

impl Cluster {
    pub async fn start(workers: usize) -> anyhow::Result<Self> {
        let workers = spawn_worker_ring(workers).await?;
        let addrs = workers.iter().map(|s| s.addr.clone()).collect();
        let broker = spawn_broker(addrs).await?;
        Ok(Self { workers, broker })
    }
}

pub fn board_with_alive(height: usize, width: usize, alive: &[(usize, usize)]) -> Board {
    let mut board = Board::dead(height, width);
    for &(x, y) in alive {
        board.set(y, x, ALIVE);
    }
    board
}

pub fn oracle(board: &Board, turns: u64) -> Board {
    let mut board = board.clone();
    for _ in 0..turns {
        board = step_board(&board);
    }
    board
}

/// Write `board` into `dir` under the `WIDTHxHEIGHT` load convention.
pub fn write_initial_board(dir: &Path, board: &Board) -> anyhow::Result<()> {
    let path = dir.join(format!("{}x{}", board.width(), board.height()));
    std::fs::write(path, board.cells())?;
    Ok(())
}

/// Controller config pointed at an in-process cluster.
pub fn controller_config(broker_addr: &str, images_dir: &Path, board: &Board, turns: u32) -> Config {
    let args = vec![
        "gol".to_owned(),
        "--broker".to_owned(),
        broker_addr.to_owned(),
        "--turns".to_owned(),
        turns.to_string(),
        "--image-width".to_owned(),
        board.width().to_string(),
        "--image-height".to_owned(),
        board.height().to_string(),
        "--images-dir".to_owned(),
        images_dir.display().to_string(),
        "--no-input".to_owned(),
    ];
    Config::parse_from(args)
}

/// Collect every event the controller emits until the stream closes.
pub fn event_collector() -> (mpsc::Sender<Event>, tokio::task::JoinHandle<Vec<Event>>) {
    let (tx, mut rx) = mpsc::channel(4096);
    let handle = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });
    (tx, handle)
}

/// Replay every `CellFlipped` over an all-dead board of the given shape.
///
/// The turn-0 flips paint the initial state, so the replay of the complete
/// stream must land exactly on the final board.
pub fn replay_flips(events: &[Event], height: usize, width: usize) -> Board {
    let mut board = Board::dead(height, width);
    for event in events {
        if let Event::CellFlipped { cell, .. } = event {
            let (x, y) = (cell.x as usize, cell.y as usize);
            let value = if board.get(y, x) == ALIVE { DEAD } else { ALIVE };
            board.set(y, x, value);
        }
    }
    board
}

/// Every `CellFlipped{turn}` must precede the first `TurnComplete{turn}`.
pub fn assert_flip_ordering(events: &[Event]) {
    let mut completed: Vec<u64> = Vec::new();
    for event in events {
        match event {
            Event::CellFlipped { turn, .. } => {
                assert!(
                    !completed.contains(turn),
                    "CellFlipped for turn {turn} after its TurnComplete"
                );
            }
            Event::TurnComplete { turn } => {
                if !completed.contains(turn) {
                    completed.push(*turn);
                }
            }
            _ => {}
        }
    }
}
