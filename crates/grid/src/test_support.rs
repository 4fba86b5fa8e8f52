// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process servers on ephemeral ports for integration tests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::broker::{BrokerGrpc, BrokerState};
use crate::rpc::proto::broker_client::BrokerClient;
use crate::rpc::proto::worker_client::WorkerClient;
use crate::worker::{WorkerGrpc, WorkerState};

/// A spawned in-process service.
pub struct SpawnedServer {
    pub addr: String,
    pub shutdown: CancellationToken,
    pub handle: tokio::task::JoinHandle<()>,
}

/// Spawn one worker server on an ephemeral loopback port.
pub async fn spawn_worker() -> anyhow::Result<SpawnedServer> {
    let shutdown = CancellationToken::new();
    let state = Arc::new(WorkerState::new(shutdown.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let signal = shutdown.clone();
    let handle = tokio::spawn(async move {
        let _ = WorkerGrpc::new(state)
            .into_router()
            .serve_with_incoming_shutdown(incoming, signal.cancelled())
            .await;
    });
    Ok(SpawnedServer { addr, shutdown, handle })
}

/// Spawn a ring of `count` workers.
pub async fn spawn_worker_ring(count: usize) -> anyhow::Result<Vec<SpawnedServer>> {
    let mut servers = Vec::with_capacity(count);
    for _ in 0..count {
        servers.push(spawn_worker().await?);
    }
    Ok(servers)
}

/// Spawn a broker server configured with the given worker addresses.
pub async fn spawn_broker(worker_addrs: Vec<String>) -> anyhow::Result<SpawnedServer> {
    let shutdown = CancellationToken::new();
    let state = Arc::new(BrokerState::new(worker_addrs, shutdown.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let signal = shutdown.clone();
    let handle = tokio::spawn(async move {
        let _ = BrokerGrpc::new(state)
            .into_router()
            .serve_with_incoming_shutdown(incoming, signal.cancelled())
            .await;
    });
    Ok(SpawnedServer { addr, shutdown, handle })
}

/// Connect a broker client to a spawned server.
pub async fn broker_client(
    addr: &str,
) -> anyhow::Result<BrokerClient<tonic::transport::Channel>> {
    let channel = tonic::transport::Channel::from_shared(format!("http://{addr}"))?
        .connect()
        .await?;
    Ok(BrokerClient::new(channel))
}

/// Connect a worker client to a spawned server.
pub async fn worker_client(
    addr: &str,
) -> anyhow::Result<WorkerClient<tonic::transport::Channel>> {
    let channel = tonic::transport::Channel::from_shared(format!("http://{addr}"))?
        .connect()
        .await?;
    Ok(WorkerClient::new(channel))
}
