// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime control through the controller's keypress FSM: save, pause,
//! resume, quit, kill.

use std::time::Duration;

use gol::event::{Event, ExecState};
use gol_specs::{
    board_with_alive, controller_config, event_collector, oracle, write_initial_board, Cluster,
};
use golgrid::board::Board;
use tokio::sync::mpsc;

fn glider_board() -> Board {
    board_with_alive(16, 16, &[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)])
}

/// Turn target large enough that only a stop key ends the run.
const ENDLESS: u32 = 1_000_000;

#[tokio::test]
async fn pause_resume_quit_through_keypresses() -> anyhow::Result<()> {
    let cluster = Cluster::start(4).await?;
    let images = tempfile::tempdir()?;
    let board = glider_board();
    write_initial_board(images.path(), &board)?;

    let config = controller_config(&cluster.broker.addr, images.path(), &board, ENDLESS);
    let (events, collected) = event_collector();
    let (key_tx, key_rx) = mpsc::channel::<u8>(8);

    let driver = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let _ = key_tx.send(b'p').await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        let _ = key_tx.send(b'p').await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = key_tx.send(b'q').await;
    });

    gol::controller::run(&config, events, key_rx).await?;
    driver.await?;
    let events = collected.await?;

    let states: Vec<ExecState> = events
        .iter()
        .filter_map(|e| match e {
            Event::StateChange { state, .. } => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![ExecState::Paused, ExecState::Executing, ExecState::Quitting]);

    let (turn, alive) = events
        .iter()
        .find_map(|e| match e {
            Event::FinalTurnComplete { turn, alive } => Some((*turn, alive.clone())),
            _ => None,
        })
        .ok_or_else(|| anyhow::anyhow!("no FinalTurnComplete"))?;
    assert!(turn > 0);
    assert!(turn < u64::from(ENDLESS));

    // The quit result is a real generation of the input.
    let expected = oracle(&board, turn);
    assert_eq!(alive.len(), expected.alive_count());
    let saved = std::fs::read(images.path().join(format!("16x16x{turn}")))?;
    assert_eq!(saved, expected.cells());
    Ok(())
}

#[tokio::test]
async fn save_key_writes_an_intermediate_image() -> anyhow::Result<()> {
    let cluster = Cluster::start(2).await?;
    let images = tempfile::tempdir()?;
    let board = glider_board();
    write_initial_board(images.path(), &board)?;

    let config = controller_config(&cluster.broker.addr, images.path(), &board, ENDLESS);
    let (events, collected) = event_collector();
    let (key_tx, key_rx) = mpsc::channel::<u8>(8);

    let driver = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = key_tx.send(b's').await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = key_tx.send(b'q').await;
    });

    gol::controller::run(&config, events, key_rx).await?;
    driver.await?;
    let events = collected.await?;

    // Two images: the keypress save and the final one.
    let filenames: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            Event::ImageOutputComplete { filename, .. } => Some(filename.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(filenames.len(), 2);

    for filename in &filenames {
        let turn: u64 = filename.rsplit('x').next().unwrap_or("0").parse()?;
        let saved = std::fs::read(images.path().join(filename))?;
        assert_eq!(saved, oracle(&board, turn).cells(), "image {filename}");
    }
    Ok(())
}

#[tokio::test]
async fn kill_key_saves_and_shuts_the_cluster_down() -> anyhow::Result<()> {
    let cluster = Cluster::start(2).await?;
    let images = tempfile::tempdir()?;
    let board = glider_board();
    write_initial_board(images.path(), &board)?;

    let config = controller_config(&cluster.broker.addr, images.path(), &board, ENDLESS);
    let (events, collected) = event_collector();
    let (key_tx, key_rx) = mpsc::channel::<u8>(8);

    let driver = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let _ = key_tx.send(b'k').await;
    });

    gol::controller::run(&config, events, key_rx).await?;
    driver.await?;
    let events = collected.await?;

    let final_turn = events.iter().find_map(|e| match e {
        Event::FinalTurnComplete { turn, .. } => Some(*turn),
        _ => None,
    });
    assert!(final_turn.is_some(), "kill must report a final turn");
    assert!(matches!(
        events.last(),
        Some(Event::StateChange { state: ExecState::Quitting, .. })
    ));

    // Every service process winds down after the kill.
    tokio::time::timeout(Duration::from_secs(5), cluster.broker.handle).await??;
    for worker in cluster.workers {
        tokio::time::timeout(Duration::from_secs(5), worker.handle).await??;
    }
    Ok(())
}
