// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Literal-input scenarios from the system's contract, run through the full
//! stack: controller -> broker -> worker ring.

use gol::event::Event;
use gol_specs::{
    assert_flip_ordering, board_with_alive, controller_config, event_collector, oracle,
    replay_flips, write_initial_board, Cluster,
};
use golgrid::board::Board;
use tokio::sync::mpsc;

/// Run the controller against a fresh cluster and return the event stream.
async fn run_controller(
    board: &Board,
    turns: u32,
    workers: usize,
) -> anyhow::Result<(Vec<Event>, tempfile::TempDir)> {
    let cluster = Cluster::start(workers).await?;
    let images = tempfile::tempdir()?;
    write_initial_board(images.path(), board)?;

    let config = controller_config(&cluster.broker.addr, images.path(), board, turns);
    let (events, collected) = event_collector();
    let (_key_tx, key_rx) = mpsc::channel::<u8>(1);

    gol::controller::run(&config, events, key_rx).await?;
    Ok((collected.await?, images))
}

fn final_turn(events: &[Event]) -> (u64, Vec<golgrid::board::Cell>) {
    events
        .iter()
        .find_map(|e| match e {
            Event::FinalTurnComplete { turn, alive } => Some((*turn, alive.clone())),
            _ => None,
        })
        .unwrap_or((0, vec![]))
}

#[tokio::test]
async fn blinker_returns_home_after_two_turns() -> anyhow::Result<()> {
    let board = board_with_alive(5, 5, &[(2, 1), (2, 2), (2, 3)]);
    let (events, _images) = run_controller(&board, 2, 4).await?;

    let (turn, alive) = final_turn(&events);
    assert_eq!(turn, 2);
    let mut cells: Vec<(u32, u32)> = alive.iter().map(|c| (c.x, c.y)).collect();
    cells.sort_unstable();
    assert_eq!(cells, vec![(2, 1), (2, 2), (2, 3)]);

    assert_flip_ordering(&events);
    assert_eq!(replay_flips(&events, 5, 5), board);
    Ok(())
}

#[tokio::test]
async fn blinker_flips_sideways_after_one_turn() -> anyhow::Result<()> {
    let board = board_with_alive(5, 5, &[(2, 1), (2, 2), (2, 3)]);
    let (events, _images) = run_controller(&board, 1, 2).await?;

    let (turn, alive) = final_turn(&events);
    assert_eq!(turn, 1);
    let mut cells: Vec<(u32, u32)> = alive.iter().map(|c| (c.x, c.y)).collect();
    cells.sort_unstable();
    assert_eq!(cells, vec![(1, 2), (2, 2), (3, 2)]);

    assert_eq!(replay_flips(&events, 5, 5), oracle(&board, 1));
    Ok(())
}

#[tokio::test]
async fn block_survives_ten_turns_untouched() -> anyhow::Result<()> {
    let board = board_with_alive(4, 4, &[(1, 1), (2, 1), (1, 2), (2, 2)]);
    let (events, _images) = run_controller(&board, 10, 4).await?;

    let (turn, alive) = final_turn(&events);
    assert_eq!(turn, 10);
    assert_eq!(alive.len(), 4);
    assert_eq!(replay_flips(&events, 4, 4), board);
    Ok(())
}

#[tokio::test]
async fn empty_board_stays_empty_and_counts_zero() -> anyhow::Result<()> {
    let board = Board::dead(8, 8);
    let (events, _images) = run_controller(&board, 50, 4).await?;

    let (turn, alive) = final_turn(&events);
    assert_eq!(turn, 50);
    assert!(alive.is_empty());

    for event in &events {
        match event {
            Event::AliveCellsCount { count, .. } => assert_eq!(*count, 0),
            Event::CellFlipped { .. } => anyhow::bail!("flip on an empty board: {event:?}"),
            _ => {}
        }
    }
    Ok(())
}

#[tokio::test]
async fn zero_turns_returns_the_input_board() -> anyhow::Result<()> {
    let board = board_with_alive(6, 6, &[(1, 1), (4, 2), (3, 3)]);
    let (events, images) = run_controller(&board, 0, 4).await?;

    let (turn, alive) = final_turn(&events);
    assert_eq!(turn, 0);
    assert_eq!(alive.len(), 3);

    let saved = std::fs::read(images.path().join("6x6x0"))?;
    assert_eq!(saved, board.cells());
    Ok(())
}

#[tokio::test]
async fn toroidal_corner_cluster_matches_the_oracle() -> anyhow::Result<()> {
    let board = board_with_alive(3, 3, &[(0, 0), (2, 0), (0, 2)]);
    let (events, images) = run_controller(&board, 1, 3).await?;

    let (turn, alive) = final_turn(&events);
    assert_eq!(turn, 1);
    assert_eq!(alive.len(), oracle(&board, 1).alive_count());

    let saved = std::fs::read(images.path().join("3x3x1"))?;
    assert_eq!(saved, oracle(&board, 1).cells());
    Ok(())
}

#[tokio::test]
async fn final_image_is_written_with_the_turn_in_its_name() -> anyhow::Result<()> {
    let board = board_with_alive(16, 16, &[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]);
    let (events, images) = run_controller(&board, 20, 4).await?;

    let filename = events
        .iter()
        .find_map(|e| match e {
            Event::ImageOutputComplete { filename, .. } => Some(filename.clone()),
            _ => None,
        })
        .unwrap_or_default();
    assert_eq!(filename, "16x16x20");

    let saved = std::fs::read(images.path().join(&filename))?;
    assert_eq!(saved, oracle(&board, 20).cells());

    // The stream ends with the quitting state change.
    assert!(matches!(
        events.last(),
        Some(Event::StateChange { state: gol::event::ExecState::Quitting, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn missing_initial_image_is_fatal_at_startup() -> anyhow::Result<()> {
    let cluster = Cluster::start(2).await?;
    let images = tempfile::tempdir()?;
    let board = Board::dead(4, 4);

    let config = controller_config(&cluster.broker.addr, images.path(), &board, 5);
    let (events, collected) = event_collector();
    let (_key_tx, key_rx) = mpsc::channel::<u8>(1);

    let result = gol::controller::run(&config, events, key_rx).await;
    assert!(result.is_err());
    assert!(collected.await?.is_empty());
    Ok(())
}
