// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use gol::config::Config;
use gol::event::Event;

#[tokio::main]
async fn main() {
    let config = Config::parse();
    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
    init_tracing(&config.log_format, &config.log_level);

    // The event consumer stands in for the rendering channel: every event is
    // logged, the headline ones at info.
    let (event_tx, mut event_rx) = mpsc::channel::<Event>(256);
    let consumer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let line = serde_json::to_string(&event).unwrap_or_default();
            match event {
                Event::AliveCellsCount { turn, count } => info!(turn, count, "alive cells"),
                Event::ImageOutputComplete { ref filename, .. } => {
                    info!(filename = filename.as_str(), "image written");
                }
                Event::FinalTurnComplete { turn, ref alive } => {
                    info!(turn, alive = alive.len(), "final turn complete");
                }
                Event::StateChange { turn, state } => {
                    info!(turn, state = state.as_str(), "state change");
                }
                _ => debug!(event = line.as_str(), "event"),
            }
        }
    });

    let (keys, raw_guard) = gol::keys::listen(config.no_input);

    let result = gol::controller::run(&config, event_tx, keys).await;

    // Restore the terminal before reporting the outcome.
    drop(raw_guard);
    let _ = consumer.await;

    if let Err(e) = result {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
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
