// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job driver: dial, ring wiring, simulation fan-out, reassembly, and the
//! two-phase consistent snapshot.

use std::sync::Arc;

use futures_util::future::try_join_all;
use tonic::transport::Channel;
use tonic::Status;
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::error::ErrorCode;
use crate::partition;
use crate::rpc::proto::worker_client::WorkerClient;
use crate::rpc::{self, proto};
use crate::state::RunState;
use crate::worker::dial_worker;

use super::{ActiveJob, BrokerState};

/// Snapshot retry bound: a fast ring can evict the chosen generation
/// between the two fetch phases.
const SNAPSHOT_RETRIES: usize = 3;

/// Reassembled final board and the worker-local turns that actually ran.
pub struct JobOutcome {
    pub board: Board,
    pub completed: u64,
}

/// Run one job end to end against the configured workers.
pub async fn run_job(
    state: &Arc<BrokerState>,
    board: Board,
    base_turn: u64,
    turns: u32,
    threads: u32,
) -> Result<JobOutcome, Status> {
    let height = board.height();
    let count = partition::active_workers(height, state.worker_addrs.len());
    let addrs = &state.worker_addrs[..count];
    let ranges = partition::strip_ranges(height, count);

    // (a) dial every worker; a dial failure is fatal to the job.
    let mut workers = Vec::with_capacity(count);
    for addr in addrs {
        workers.push(dial_worker(addr).await?);
    }

    // (b) wire the ring: worker i's above is (i-1) mod N, below (i+1) mod N.
    for (index, client) in workers.iter().enumerate() {
        let request = proto::InitialiseConnectionRequest {
            above_addr: addrs[(index + count - 1) % count].clone(),
            below_addr: addrs[(index + 1) % count].clone(),
            worker_id: index as u32,
            worker_count: count as u32,
        };
        client
            .clone()
            .initialise_connection(request)
            .await
            .map_err(|e| ErrorCode::Setup.to_grpc_status(format!("worker {index} setup: {e}")))?;
    }
    info!(workers = count, "ring wired");

    // Publish the handles so SetState and GetSnapshot can reach the ring.
    state.publish_job(ActiveJob { workers: workers.clone(), base_turn });

    // (c) fan out the simulation and await every strip.
    let simulations = workers.iter().zip(ranges.iter()).enumerate().map(
        |(index, (client, range))| {
            let mut client = client.clone();
            let strip = board.slice_rows(range.start, range.end);
            async move {
                let response = client
                    .simulate(proto::SimulateRequest {
                        strip: Some(rpc::board_to_proto(&strip)),
                        turns,
                        threads,
                    })
                    .await
                    .map_err(|e| {
                        Status::new(e.code(), format!("worker {index} simulate: {}", e.message()))
                    })?
                    .into_inner();
                let strip_matrix = response.strip.as_ref().ok_or_else(|| {
                    ErrorCode::Internal.to_grpc_status(format!("worker {index} returned no strip"))
                })?;
                let strip = rpc::board_from_proto(strip_matrix)?;
                Ok::<(Board, u64), Status>((strip, response.completed_turns))
            }
        },
    );
    let results = try_join_all(simulations).await?;

    // (d)+(e) reconcile to the max-commonly-completed turn and reassemble.
    // On an early quit workers may stop up to the ring skew apart; laggard
    // strips are re-fetched from history at the settled turn.
    let settled = results.iter().map(|(_, completed)| *completed).min().unwrap_or(0);
    let mut strips = Vec::with_capacity(count);
    for (index, (strip, completed)) in results.into_iter().enumerate() {
        if completed == settled {
            strips.push(strip);
        } else {
            debug!(worker = index, completed, settled, "re-fetching strip at settled turn");
            strips.push(fetch_section_at(&workers[index], index, settled).await?);
        }
    }

    let board = partition::reassemble(&strips)
        .map_err(|e| ErrorCode::Internal.to_grpc_status(e.to_string()))?;
    Ok(JobOutcome { board, completed: settled })
}

/// Reassemble the board at the largest turn every worker has completed.
///
/// Phase one collects each worker's latest committed turn; phase two
/// re-fetches, at the minimum of those, from any worker that had advanced
/// past it. Retried when a fast ring evicts the chosen generation in
/// between.
pub async fn snapshot(active: &ActiveJob) -> Result<(Board, u64), Status> {
    let mut last_error = ErrorCode::Internal.to_grpc_status("snapshot never attempted");

    for _ in 0..SNAPSHOT_RETRIES {
        let latest = try_join_all(active.workers.iter().cloned().map(|mut client| async move {
            let response = client
                .get_snapshot_section(proto::GetSnapshotSectionRequest { turn: None })
                .await?
                .into_inner();
            let strip_matrix = response
                .strip
                .as_ref()
                .ok_or_else(|| ErrorCode::Internal.to_grpc_status("section missing strip"))?;
            Ok::<(Board, u64), Status>((rpc::board_from_proto(strip_matrix)?, response.turn))
        }))
        .await?;

        let settled = latest.iter().map(|(_, turn)| *turn).min().unwrap_or(0);

        let mut strips = Vec::with_capacity(latest.len());
        let mut evicted = false;
        for (index, (strip, turn)) in latest.into_iter().enumerate() {
            if turn == settled {
                strips.push(strip);
                continue;
            }
            match fetch_section_at(&active.workers[index], index, settled).await {
                Ok(strip) => strips.push(strip),
                Err(status) if status.code() == tonic::Code::NotFound => {
                    evicted = true;
                    last_error = status;
                    break;
                }
                Err(status) => return Err(status),
            }
        }
        if evicted {
            continue;
        }

        let board = partition::reassemble(&strips)
            .map_err(|e| ErrorCode::Internal.to_grpc_status(e.to_string()))?;
        return Ok((board, settled));
    }

    Err(last_error)
}

/// Fetch one worker's retained strip at an explicit generation.
async fn fetch_section_at(
    client: &WorkerClient<Channel>,
    index: usize,
    turn: u64,
) -> Result<Board, Status> {
    let response = client
        .clone()
        .get_snapshot_section(proto::GetSnapshotSectionRequest { turn: Some(turn) })
        .await
        .map_err(|e| Status::new(e.code(), format!("worker {index} section: {}", e.message())))?
        .into_inner();
    let strip_matrix = response
        .strip
        .as_ref()
        .ok_or_else(|| ErrorCode::Internal.to_grpc_status(format!("worker {index} empty section")))?;
    rpc::board_from_proto(strip_matrix)
}

/// Push a run-state change to every worker of the active job.
///
/// Individual failures are logged, not propagated: a worker that is already
/// gone will surface through the simulation fan-out instead.
pub async fn fan_out_control(workers: &[WorkerClient<Channel>], next: RunState) {
    let calls = workers.iter().cloned().enumerate().map(|(index, mut client)| async move {
        let request = proto::ControlRequest { state: rpc::run_state_to_proto(next) as i32 };
        if let Err(e) = client.control(request).await {
            warn!(worker = index, error = %e, "control fan-out failed");
        }
    });
    futures_util::future::join_all(calls).await;
}
