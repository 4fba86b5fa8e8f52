// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker service: owns one horizontal strip of the world.
//!
//! A job context is created by `InitialiseConnection` (ring wiring), driven
//! by one `Simulate` call, and queried by neighbours (`GetRow`) and the
//! broker (`GetSnapshotSection`, `Control`) while the simulation runs.

pub mod gate;
pub mod sim;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::board::Board;
use crate::error::ErrorCode;
use crate::rpc::proto::worker_client::WorkerClient;
use crate::rpc::{self, proto, RowEdge};
use crate::state::RunState;
use gate::{GateError, RowGate};

/// Timeout for dialing a ring neighbour during job setup.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace window between a kill order and process shutdown, so the broker
/// can still collect final strips from this worker.
pub const KILL_GRACE: Duration = Duration::from_secs(1);

/// Committed strips of recent generations, bounded.
///
/// Retention must cover the ring's maximum generation skew plus the
/// broker's two-phase snapshot window.
pub struct StripHistory {
    depth: usize,
    entries: VecDeque<(u64, Board)>,
}

impl StripHistory {
    pub fn new(depth: usize) -> Self {
        Self { depth, entries: VecDeque::with_capacity(depth) }
    }

    /// Record a committed generation, evicting the oldest past `depth`.
    pub fn push(&mut self, turn: u64, strip: Board) {
        self.entries.push_back((turn, strip));
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&(u64, Board)> {
        self.entries.back()
    }

    pub fn at(&self, turn: u64) -> Option<&Board> {
        self.entries.iter().find(|(t, _)| *t == turn).map(|(_, strip)| strip)
    }
}

/// Per-job state: neighbour links, row gates, control, strip history.
pub struct JobContext {
    pub worker_id: u32,
    pub above: WorkerClient<Channel>,
    pub below: WorkerClient<Channel>,
    pub top_gate: RowGate,
    pub bottom_gate: RowGate,
    pub control: watch::Sender<RunState>,
    pub history: Mutex<StripHistory>,
    /// Guards against a second `Simulate` on the same job context.
    running: AtomicBool,
}

/// Process-wide worker state.
pub struct WorkerState {
    job: tokio::sync::RwLock<Option<Arc<JobContext>>>,
    /// Cancelled on `Killing`; the serving loop drains and the process exits.
    pub shutdown: CancellationToken,
}

impl WorkerState {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { job: tokio::sync::RwLock::new(None), shutdown }
    }

    async fn job(&self) -> Result<Arc<JobContext>, Status> {
        self.job
            .read()
            .await
            .clone()
            .ok_or_else(|| ErrorCode::Protocol.to_grpc_status("no connection initialised"))
    }
}

/// Dial a peer worker with the setup timeout.
pub async fn dial_worker(addr: &str) -> Result<WorkerClient<Channel>, Status> {
    let endpoint = Endpoint::from_shared(format!("http://{addr}"))
        .map_err(|e| ErrorCode::Setup.to_grpc_status(format!("bad worker address {addr}: {e}")))?
        .connect_timeout(DIAL_TIMEOUT);
    let channel = endpoint
        .connect()
        .await
        .map_err(|e| ErrorCode::Setup.to_grpc_status(format!("dial {addr} failed: {e}")))?;
    Ok(WorkerClient::new(channel))
}

/// gRPC implementation of the `gol.v1.Worker` service.
pub struct WorkerGrpc {
    state: Arc<WorkerState>,
}

impl WorkerGrpc {
    pub fn new(state: Arc<WorkerState>) -> Self {
        Self { state }
    }

    /// Build a [`tonic`] router for this service.
    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder()
            .add_service(proto::worker_server::WorkerServer::new(self))
    }
}

#[tonic::async_trait]
impl proto::worker_server::Worker for WorkerGrpc {
    async fn initialise_connection(
        &self,
        request: Request<proto::InitialiseConnectionRequest>,
    ) -> Result<Response<proto::InitialiseConnectionResponse>, Status> {
        let req = request.into_inner();
        info!(
            worker = req.worker_id,
            above = req.above_addr.as_str(),
            below = req.below_addr.as_str(),
            "initialising neighbour connections"
        );

        let above = dial_worker(&req.above_addr).await?;
        let below = dial_worker(&req.below_addr).await?;

        // Retention covers the ring skew (at most half the ring) plus the
        // snapshot fetch window.
        let depth = req.worker_count.max(1) as usize + 4;
        let (control, _) = watch::channel(RunState::Running);
        let context = Arc::new(JobContext {
            worker_id: req.worker_id,
            above,
            below,
            top_gate: RowGate::new(),
            bottom_gate: RowGate::new(),
            control,
            history: Mutex::new(StripHistory::new(depth)),
            running: AtomicBool::new(false),
        });

        // A repeated call replaces the previous job context wholesale.
        *self.state.job.write().await = Some(context);
        Ok(Response::new(proto::InitialiseConnectionResponse {}))
    }

    async fn simulate(
        &self,
        request: Request<proto::SimulateRequest>,
    ) -> Result<Response<proto::SimulateResponse>, Status> {
        let req = request.into_inner();
        let job = self.state.job().await?;

        let strip_matrix = req
            .strip
            .as_ref()
            .ok_or_else(|| ErrorCode::Protocol.to_grpc_status("simulate request missing strip"))?;
        let strip = rpc::board_from_proto(strip_matrix)?;

        if job.running.swap(true, Ordering::AcqRel) {
            return Err(ErrorCode::Protocol.to_grpc_status("simulation already in flight"));
        }
        if job.top_gate.is_closed() || job.bottom_gate.is_closed() {
            job.running.store(false, Ordering::Release);
            return Err(ErrorCode::Protocol
                .to_grpc_status("job context already consumed; reinitialise the connection"));
        }

        info!(
            worker = job.worker_id,
            rows = strip.height(),
            cols = strip.width(),
            turns = req.turns,
            "simulation started"
        );

        // Generation 0 is the strip as received; arm both gates with its
        // boundary rows so neighbours can begin their first exchange.
        job.history.lock().push(0, strip.clone());
        job.top_gate.arm(strip.top_row());
        job.bottom_gate.arm(strip.bottom_row());

        let result = sim::run(Arc::clone(&job), strip, req.turns, req.threads.max(1)).await;
        job.running.store(false, Ordering::Release);

        let outcome = result?;
        info!(worker = job.worker_id, completed = outcome.completed, "simulation finished");
        Ok(Response::new(proto::SimulateResponse {
            strip: Some(rpc::board_to_proto(&outcome.strip)),
            completed_turns: outcome.completed,
        }))
    }

    async fn get_row(
        &self,
        request: Request<proto::GetRowRequest>,
    ) -> Result<Response<proto::GetRowResponse>, Status> {
        let req = request.into_inner();
        let job = self.state.job().await?;
        let edge = rpc::row_edge_from_proto(req.edge())?;

        let gate = match edge {
            RowEdge::Top => &job.top_gate,
            RowEdge::Bottom => &job.bottom_gate,
        };

        match gate.take().await {
            Ok(row) => Ok(Response::new(proto::GetRowResponse { row })),
            Err(GateError::AlreadyServed) => Err(ErrorCode::Protocol.to_grpc_status(format!(
                "{} row already served this generation",
                edge.as_str()
            ))),
            Err(GateError::Closed) => {
                Err(ErrorCode::Stopped.to_grpc_status("row gate closed: simulation stopped"))
            }
        }
    }

    async fn get_snapshot_section(
        &self,
        request: Request<proto::GetSnapshotSectionRequest>,
    ) -> Result<Response<proto::GetSnapshotSectionResponse>, Status> {
        let req = request.into_inner();
        let job = self.state.job().await?;
        let history = job.history.lock();

        let (turn, strip) = match req.turn {
            None => {
                let (turn, strip) = history
                    .latest()
                    .ok_or_else(|| Status::not_found("no generation committed yet"))?;
                (*turn, strip)
            }
            Some(turn) => {
                let strip = history.at(turn).ok_or_else(|| {
                    Status::not_found(format!("strip at generation {turn} no longer retained"))
                })?;
                (turn, strip)
            }
        };

        Ok(Response::new(proto::GetSnapshotSectionResponse {
            strip: Some(rpc::board_to_proto(strip)),
            turn,
        }))
    }

    async fn control(
        &self,
        request: Request<proto::ControlRequest>,
    ) -> Result<Response<proto::ControlResponse>, Status> {
        let req = request.into_inner();
        let state = rpc::run_state_from_proto(req.state())?;

        if let Some(job) = self.state.job.read().await.clone() {
            info!(worker = job.worker_id, state = state.as_str(), "control state changed");
            job.control.send_replace(state);
        } else if state != RunState::Killing {
            warn!(state = state.as_str(), "control received with no active job");
        }

        if state == RunState::Killing {
            let shutdown = self.state.shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(KILL_GRACE).await;
                shutdown.cancel();
            });
        }
        Ok(Response::new(proto::ControlResponse {}))
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
