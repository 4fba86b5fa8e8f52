// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use golgrid::broker::{BrokerGrpc, BrokerState};
use golgrid::config::BrokerConfig;

#[tokio::main]
async fn main() {
    let config = BrokerConfig::parse();
    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
    init_tracing(&config.log_format, &config.log_level);

    if let Err(e) = run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: BrokerConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = Arc::new(BrokerState::new(config.worker_addrs(), shutdown.clone()));

    let addr: std::net::SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(%addr, workers = state.worker_addrs.len(), "broker listening");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    BrokerGrpc::new(state)
        .into_router()
        .serve_with_shutdown(addr, shutdown.cancelled())
        .await?;
    info!("broker stopped");
    Ok(())
}

fn init_tracing(format: &str, level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_owned()));
    if format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
