// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-generation halo-exchange loop.
//!
//! Each generation: fetch both halo rows from the ring neighbours, wait for
//! both of our own boundary rows to be taken, compute the next strip off the
//! async runtime, then commit and rearm. Control-state changes are honored
//! at iteration boundaries; a stop mid-exchange propagates around the ring
//! through closed gates.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::board::Board;
use crate::error::{is_stop_status, ErrorCode};
use crate::rpc::proto;
use crate::state::RunState;
use crate::stencil::step_strip;
use crate::worker::gate::GateError;
use crate::worker::JobContext;

/// Final strip and how many generations actually ran (short of the request
/// on an early quit).
pub struct SimOutcome {
    pub strip: Board,
    pub completed: u64,
}

enum SimAbort {
    /// A neighbour stopped or we were told to; stop at this boundary.
    Stopped,
    /// A neighbour connection failed mid-generation.
    Peer(tonic::Status),
    Internal(String),
}

/// Run `turns` generations of the owned strip.
///
/// Gates must be armed with the initial strip's rows before this is called.
/// On return (normal or early) both gates are closed.
pub async fn run(
    job: Arc<JobContext>,
    mut strip: Board,
    turns: u32,
    threads: u32,
) -> Result<SimOutcome, tonic::Status> {
    let mut control = job.control.subscribe();
    let mut completed: u64 = 0;

    for _ in 0..turns {
        // Iteration boundary: park while paused, stop on quit/kill.
        let state = match control.wait_for(|s| *s != RunState::Pausing).await {
            Ok(guard) => *guard,
            Err(_) => RunState::Quitting,
        };
        if state.is_stopping() {
            debug!(worker = job.worker_id, completed, "stopping at iteration boundary");
            break;
        }

        let current = strip.clone();
        let exchange = exchange_and_step(&job, &current, threads);
        tokio::pin!(exchange);
        let next = tokio::select! {
            res = &mut exchange => res,
            _ = wait_stop(&mut control) => Err(SimAbort::Stopped),
        };

        match next {
            Ok(board) => {
                completed += 1;
                strip = board;
                job.history.lock().push(completed, strip.clone());
                job.top_gate.arm(strip.top_row());
                job.bottom_gate.arm(strip.bottom_row());
            }
            Err(SimAbort::Stopped) => {
                debug!(worker = job.worker_id, completed, "stop observed mid-exchange");
                break;
            }
            Err(SimAbort::Peer(status)) => {
                job.top_gate.close();
                job.bottom_gate.close();
                return Err(ErrorCode::Peer
                    .to_grpc_status(format!("neighbour lost mid-generation: {status}")));
            }
            Err(SimAbort::Internal(message)) => {
                job.top_gate.close();
                job.bottom_gate.close();
                return Err(ErrorCode::Internal.to_grpc_status(message));
            }
        }
    }

    job.top_gate.close();
    job.bottom_gate.close();
    Ok(SimOutcome { strip, completed })
}

/// Resolve once the control state demands a stop.
async fn wait_stop(control: &mut watch::Receiver<RunState>) {
    // A dropped sender means the job context went away; treat as a stop.
    let _ = control.wait_for(|s| s.is_stopping()).await;
}

/// One generation: all four row transfers, then the stencil pass.
async fn exchange_and_step(
    job: &Arc<JobContext>,
    strip: &Board,
    threads: u32,
) -> Result<Board, SimAbort> {
    let mut above = job.above.clone();
    let mut below = job.below.clone();

    // Both outgoing calls are issued concurrently before either incoming one
    // is required to complete; this is what keeps the ring deadlock-free.
    let (top_halo, bottom_halo) = tokio::try_join!(
        async {
            above
                .get_row(proto::GetRowRequest { edge: proto::RowEdge::Bottom as i32 })
                .await
                .map(|resp| resp.into_inner().row)
                .map_err(classify_fetch)
        },
        async {
            below
                .get_row(proto::GetRowRequest { edge: proto::RowEdge::Top as i32 })
                .await
                .map(|resp| resp.into_inner().row)
                .map_err(classify_fetch)
        },
    )?;

    let width = strip.width();
    if top_halo.len() != width || bottom_halo.len() != width {
        return Err(SimAbort::Internal(format!(
            "halo width mismatch: got {}/{}, strip is {width}",
            top_halo.len(),
            bottom_halo.len()
        )));
    }

    // Our own rows for this generation must both be gone before we commit.
    gate_wait(job.top_gate.wait_served().await)?;
    gate_wait(job.bottom_gate.wait_served().await)?;

    let strip = strip.clone();
    tokio::task::spawn_blocking(move || {
        step_strip(&strip, &top_halo, &bottom_halo, threads as usize)
    })
    .await
    .map_err(|e| SimAbort::Internal(format!("stencil task failed: {e}")))
}

fn classify_fetch(status: tonic::Status) -> SimAbort {
    if is_stop_status(&status) {
        SimAbort::Stopped
    } else {
        SimAbort::Peer(status)
    }
}

fn gate_wait(result: Result<(), GateError>) -> Result<(), SimAbort> {
    match result {
        Ok(()) => Ok(()),
        Err(GateError::Closed) => Err(SimAbort::Stopped),
        Err(GateError::AlreadyServed) => Ok(()),
    }
}
