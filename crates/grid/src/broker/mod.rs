// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker service: the single coordinator.
//!
//! Accepts one job at a time, partitions the board across the configured
//! workers, wires the ring, fans out the simulation, and owns the latest
//! reassembled board for snapshots and resumption.

pub mod job;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::board::Board;
use crate::error::ErrorCode;
use crate::rpc::proto::worker_client::WorkerClient;
use crate::rpc::{self, proto};
use crate::state::RunState;

/// Board and turn-count latched by a quit, for `continue_previous_world`.
#[derive(Debug, Clone)]
pub struct ResumeLatch {
    pub board: Board,
    pub completed: u64,
    pub target_turns: u32,
}

/// Engine state, latest board, and resume latch under one mutex.
struct EngineInner {
    state: RunState,
    /// Most recently reassembled full board and its completed turn.
    latest: Option<(Board, u64)>,
    resume: Option<ResumeLatch>,
}

/// The running job's worker handles, published for control and snapshot
/// fan-out.
pub struct ActiveJob {
    pub workers: Vec<WorkerClient<Channel>>,
    /// Turn offset of this job (non-zero when resuming a quit run).
    pub base_turn: u64,
}

/// Process-wide broker state.
pub struct BrokerState {
    pub worker_addrs: Vec<String>,
    engine: Mutex<EngineInner>,
    job_slot: AtomicBool,
    active: RwLock<Option<Arc<ActiveJob>>>,
    /// Cancelled on `Killing`; the serving loop drains and the process exits.
    pub shutdown: CancellationToken,
}

impl BrokerState {
    pub fn new(worker_addrs: Vec<String>, shutdown: CancellationToken) -> Self {
        Self {
            worker_addrs,
            engine: Mutex::new(EngineInner {
                state: RunState::Running,
                latest: None,
                resume: None,
            }),
            job_slot: AtomicBool::new(false),
            active: RwLock::new(None),
            shutdown,
        }
    }

    fn latest(&self) -> Option<(Board, u64)> {
        self.engine.lock().latest.clone()
    }

    fn set_latest(&self, board: Board, completed: u64) {
        self.engine.lock().latest = Some((board, completed));
    }

    pub fn active_job(&self) -> Option<Arc<ActiveJob>> {
        self.active.read().clone()
    }

    fn publish_job(&self, job: ActiveJob) {
        *self.active.write() = Some(Arc::new(job));
    }
}

/// RAII hold on the at-most-one job slot. Releasing also retires the
/// published worker handles.
struct JobSlot {
    state: Arc<BrokerState>,
}

impl JobSlot {
    fn acquire(state: &Arc<BrokerState>) -> Result<Self, Status> {
        if state.job_slot.swap(true, Ordering::AcqRel) {
            return Err(ErrorCode::Busy.to_grpc_status("a simulation is already active"));
        }
        Ok(Self { state: Arc::clone(state) })
    }
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        *self.state.active.write() = None;
        self.state.job_slot.store(false, Ordering::Release);
    }
}

/// gRPC implementation of the `gol.v1.Broker` service.
pub struct BrokerGrpc {
    state: Arc<BrokerState>,
}

impl BrokerGrpc {
    pub fn new(state: Arc<BrokerState>) -> Self {
        Self { state }
    }

    /// Build a [`tonic`] router for this service.
    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder()
            .add_service(proto::broker_server::BrokerServer::new(self))
    }
}

#[tonic::async_trait]
impl proto::broker_server::Broker for BrokerGrpc {
    async fn begin_simulation(
        &self,
        request: Request<proto::BeginSimulationRequest>,
    ) -> Result<Response<proto::BeginSimulationResponse>, Status> {
        let req = request.into_inner();
        let slot = JobSlot::acquire(&self.state)?;

        let board_matrix = req
            .board
            .as_ref()
            .ok_or_else(|| ErrorCode::Protocol.to_grpc_status("request missing board"))?;
        let board = rpc::board_from_proto(board_matrix)?;

        // Resume from a latched quit when the job shape matches; otherwise
        // the flag is ignored and the latch is superseded by the fresh run.
        let (start_board, base_turn) = {
            let mut engine = self.state.engine.lock();
            let matched = req.continue_previous_world
                && engine.resume.as_ref().is_some_and(|latch| {
                    latch.target_turns == req.turns
                        && latch.board.height() == board.height()
                        && latch.board.width() == board.width()
                });
            let resumed = if matched { engine.resume.take() } else { None };
            engine.resume = None;
            engine.state = RunState::Running;
            match resumed {
                Some(latch) => {
                    info!(completed = latch.completed, "resuming previous world");
                    (latch.board, latch.completed)
                }
                None => (board, 0),
            }
        };
        self.state.set_latest(start_board.clone(), base_turn);

        let remaining = (u64::from(req.turns)).saturating_sub(base_turn) as u32;
        if remaining == 0 {
            // Nothing to run: turns=0, or the latched run had already reached
            // its target. The board passes through unchanged.
            drop(slot);
            return Ok(Response::new(proto::BeginSimulationResponse {
                board: Some(rpc::board_to_proto(&start_board)),
                completed_turns: base_turn,
            }));
        }

        info!(
            height = start_board.height(),
            width = start_board.width(),
            turns = remaining,
            base = base_turn,
            "job accepted"
        );

        let result =
            job::run_job(&self.state, start_board, base_turn, remaining, req.threads.max(1)).await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(status) => {
                warn!(error = %status, "job aborted");
                return Err(status);
            }
        };

        let completed = base_turn + outcome.completed;
        self.state.set_latest(outcome.board.clone(), completed);

        {
            let mut engine = self.state.engine.lock();
            if engine.state == RunState::Quitting {
                engine.resume = Some(ResumeLatch {
                    board: outcome.board.clone(),
                    completed,
                    target_turns: req.turns,
                });
            }
        }

        info!(completed, "job finished");
        drop(slot);
        Ok(Response::new(proto::BeginSimulationResponse {
            board: Some(rpc::board_to_proto(&outcome.board)),
            completed_turns: completed,
        }))
    }

    async fn get_snapshot(
        &self,
        _request: Request<proto::GetSnapshotRequest>,
    ) -> Result<Response<proto::GetSnapshotResponse>, Status> {
        let (board, completed) = match self.state.active_job() {
            Some(active) => match job::snapshot(&active).await {
                Ok((board, local_turn)) => {
                    let completed = active.base_turn + local_turn;
                    self.state.set_latest(board.clone(), completed);
                    (board, completed)
                }
                // Workers not yet simulating (or just finished): fall back to
                // the broker's own latest board.
                Err(_) => self
                    .state
                    .latest()
                    .ok_or_else(|| ErrorCode::Protocol.to_grpc_status("no board available"))?,
            },
            None => self
                .state
                .latest()
                .ok_or_else(|| ErrorCode::Protocol.to_grpc_status("no simulation has run"))?,
        };

        Ok(Response::new(proto::GetSnapshotResponse {
            board: Some(rpc::board_to_proto(&board)),
            completed_turns: completed,
        }))
    }

    async fn set_state(
        &self,
        request: Request<proto::SetStateRequest>,
    ) -> Result<Response<proto::SetStateResponse>, Status> {
        let req = request.into_inner();
        let next = rpc::run_state_from_proto(req.state())?;

        {
            let mut engine = self.state.engine.lock();
            if !engine.state.can_transition_to(next) {
                return Err(ErrorCode::Protocol.to_grpc_status(format!(
                    "illegal transition {} -> {}",
                    engine.state, next
                )));
            }
            engine.state = next;
        }
        info!(state = next.as_str(), "engine state set");

        // Workers honor the change at their next iteration boundary.
        if let Some(active) = self.state.active_job() {
            job::fan_out_control(&active.workers, next).await;
        }

        if next == RunState::Killing {
            // Shutdown: stop accepting, drain in-flight RPCs, exit.
            self.state.shutdown.cancel();
        }

        let (board, completed) = match self.state.latest() {
            Some((board, completed)) => (Some(rpc::board_to_proto(&board)), completed),
            None => (None, 0),
        };
        Ok(Response::new(proto::SetStateResponse { board, completed_turns: completed }))
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
