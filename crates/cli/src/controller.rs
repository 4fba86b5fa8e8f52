// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller run loop.
//!
//! Sequences one job: load the initial board, hand it to the broker, poll a
//! snapshot every two seconds for live-cell counts and cell-flip diffs,
//! translate keypresses into control RPCs, and emit the final events when
//! the simulation returns.

use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tonic::transport::Endpoint;
use tracing::{info, warn};

use golgrid::board::{Board, Cell};
use golgrid::error::is_busy_status;
use golgrid::rpc::proto::broker_client::BrokerClient;
use golgrid::rpc::{board_from_proto, board_to_proto, proto};

use crate::config::Config;
use crate::event::{Event, ExecState};
use crate::image;

/// Timeout for dialing the broker.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot polling cadence.
const TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Cells whose value differs between two boards of equal dimensions.
pub fn diff_cells(previous: &Board, next: &Board) -> Vec<Cell> {
    let mut flipped = Vec::new();
    for y in 0..next.height() {
        for x in 0..next.width() {
            if previous.get(y, x) != next.get(y, x) {
                flipped.push(Cell { x: x as u32, y: y as u32 });
            }
        }
    }
    flipped
}

async fn emit(events: &mpsc::Sender<Event>, event: Event) {
    // A departed consumer must not stall the run.
    let _ = events.send(event).await;
}

/// Emit the flips from `last_known` to `board`, then `TurnComplete`.
async fn emit_turn(events: &mpsc::Sender<Event>, last_known: &Board, board: &Board, turn: u64) {
    for cell in diff_cells(last_known, board) {
        emit(events, Event::CellFlipped { turn, cell }).await;
    }
    emit(events, Event::TurnComplete { turn }).await;
}

/// Run one simulation end to end.
///
/// `events` is the consumer-facing stream; it is closed (sender dropped) on
/// return. `keys` delivers raw keypress bytes from [`crate::keys::listen`].
pub async fn run(
    config: &Config,
    events: mpsc::Sender<Event>,
    mut keys: mpsc::Receiver<u8>,
) -> anyhow::Result<()> {
    // Startup I/O failure is fatal before any job is submitted.
    let board = image::load(&config.images_dir, config.image_width, config.image_height)?;
    info!(
        height = board.height(),
        width = board.width(),
        alive = board.alive_count(),
        "initial board loaded"
    );

    for cell in board.alive_cells() {
        emit(&events, Event::CellFlipped { turn: 0, cell }).await;
    }
    emit(&events, Event::TurnComplete { turn: 0 }).await;

    let channel = Endpoint::from_shared(format!("http://{}", config.broker))
        .with_context(|| format!("bad broker address {}", config.broker))?
        .connect_timeout(DIAL_TIMEOUT)
        .connect()
        .await
        .with_context(|| format!("broker {} unreachable", config.broker))?;
    let mut client = BrokerClient::new(channel);

    let mut simulation = {
        let mut client = client.clone();
        let request = proto::BeginSimulationRequest {
            board: Some(board_to_proto(&board)),
            turns: config.turns,
            threads: config.threads,
            continue_previous_world: config.continue_previous,
        };
        tokio::spawn(async move { client.begin_simulation(request).await })
    };

    let mut last_known = board;
    let mut last_turn: u64 = 0;
    let mut paused = false;
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.reset();

    let outcome = loop {
        tokio::select! {
            result = &mut simulation => {
                break result.context("simulation task failed")?;
            }
            _ = ticker.tick() => {
                match client.get_snapshot(proto::GetSnapshotRequest {}).await {
                    Ok(response) => {
                        let snapshot = response.into_inner();
                        let turn = snapshot.completed_turns;
                        let snapshot_board = match snapshot.board.as_ref() {
                            Some(matrix) => board_from_proto(matrix)?,
                            None => continue,
                        };
                        emit(&events, Event::AliveCellsCount {
                            turn,
                            count: snapshot_board.alive_count() as u64,
                        }).await;
                        emit_turn(&events, &last_known, &snapshot_board, turn).await;
                        last_known = snapshot_board;
                        last_turn = turn;
                    }
                    Err(status) => warn!(error = %status, "snapshot poll failed"),
                }
            }
            Some(key) = keys.recv() => {
                match key {
                    b's' => {
                        if let Ok(response) = client.get_snapshot(proto::GetSnapshotRequest {}).await {
                            let snapshot = response.into_inner();
                            if let Some(matrix) = snapshot.board.as_ref() {
                                let snapshot_board = board_from_proto(matrix)?;
                                let filename = image::save(
                                    &config.images_dir,
                                    &snapshot_board,
                                    snapshot.completed_turns,
                                )?;
                                emit(&events, Event::ImageOutputComplete {
                                    turn: snapshot.completed_turns,
                                    filename,
                                }).await;
                            }
                        }
                    }
                    b'p' => {
                        let target = if paused { proto::RunState::Running } else { proto::RunState::Pausing };
                        match client.set_state(proto::SetStateRequest { state: target as i32 }).await {
                            Ok(response) => {
                                paused = !paused;
                                let turn = response.into_inner().completed_turns;
                                let state = if paused { ExecState::Paused } else { ExecState::Executing };
                                info!(turn, state = state.as_str(), "run state toggled");
                                emit(&events, Event::StateChange { turn, state }).await;
                            }
                            Err(status) => warn!(error = %status, "pause toggle failed"),
                        }
                    }
                    // Ctrl+C arrives as a byte in raw mode; treat it as quit.
                    b'q' | 0x03 => {
                        if let Err(status) = client
                            .set_state(proto::SetStateRequest { state: proto::RunState::Quitting as i32 })
                            .await
                        {
                            warn!(error = %status, "quit request failed");
                        }
                        // The simulation returns at the next boundary and the
                        // normal completion path runs.
                    }
                    b'k' => {
                        let response = client
                            .set_state(proto::SetStateRequest { state: proto::RunState::Killing as i32 })
                            .await
                            .context("kill request failed")?
                            .into_inner();
                        let turn = response.completed_turns;
                        if let Some(matrix) = response.board.as_ref() {
                            let final_board = board_from_proto(matrix)?;
                            let filename = image::save(&config.images_dir, &final_board, turn)?;
                            emit(&events, Event::ImageOutputComplete { turn, filename }).await;
                            emit(&events, Event::FinalTurnComplete {
                                turn,
                                alive: final_board.alive_cells(),
                            }).await;
                        }
                        emit(&events, Event::StateChange { turn, state: ExecState::Quitting }).await;
                        info!(turn, "cluster killed");
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    };

    let response = match outcome {
        Ok(response) => response.into_inner(),
        Err(status) => {
            emit(&events, Event::StateChange { turn: last_turn, state: ExecState::Quitting }).await;
            if is_busy_status(&status) {
                anyhow::bail!("broker is busy with another simulation: {}", status.message());
            }
            anyhow::bail!("simulation failed: {status}");
        }
    };

    let turn = response.completed_turns;
    let final_board = match response.board.as_ref() {
        Some(matrix) => board_from_proto(matrix)?,
        None => anyhow::bail!("broker returned no final board"),
    };

    // Bring the diff stream up to the final generation so replaying every
    // CellFlipped over the initial board reproduces the result exactly.
    emit_turn(&events, &last_known, &final_board, turn).await;
    emit(&events, Event::FinalTurnComplete { turn, alive: final_board.alive_cells() }).await;

    let filename = image::save(&config.images_dir, &final_board, turn)?;
    emit(&events, Event::ImageOutputComplete { turn, filename: filename.clone() }).await;
    emit(&events, Event::StateChange { turn, state: ExecState::Quitting }).await;
    info!(turn, alive = final_board.alive_count(), filename = filename.as_str(), "run complete");

    Ok(())
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
