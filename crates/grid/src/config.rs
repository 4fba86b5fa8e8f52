// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

/// Default worker deployment: four loopback workers.
pub const DEFAULT_WORKERS: &str = "127.0.0.1:8040,127.0.0.1:8041,127.0.0.1:8042,127.0.0.1:8043";

/// Board coordinator for the distributed Life engine.
#[derive(Debug, Parser)]
#[command(name = "gol-broker", version, about)]
pub struct BrokerConfig {
    /// TCP port to listen on.
    #[arg(long, env = "GOL_BROKER_PORT", default_value = "8030")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "GOL_BROKER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Comma-separated worker addresses, in ring order.
    #[arg(long, env = "GOL_WORKERS", default_value = DEFAULT_WORKERS)]
    pub workers: String,

    /// Log format (json or text).
    #[arg(long, env = "GOL_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "GOL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl BrokerConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_addrs().is_empty() {
            anyhow::bail!("--workers must name at least one worker address");
        }
        for addr in self.worker_addrs() {
            if !addr.contains(':') {
                anyhow::bail!("worker address {addr} is missing a port");
            }
        }
        validate_log_flags(&self.log_format, &self.log_level)
    }

    /// The configured ring, in worker-index order.
    pub fn worker_addrs(&self) -> Vec<String> {
        self.workers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Strip owner for the distributed Life engine.
#[derive(Debug, Parser)]
#[command(name = "gol-worker", version, about)]
pub struct WorkerConfig {
    /// TCP port to listen on.
    #[arg(long, env = "GOL_WORKER_PORT", default_value = "8040")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "GOL_WORKER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Log format (json or text).
    #[arg(long, env = "GOL_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "GOL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_log_flags(&self.log_format, &self.log_level)
    }
}

fn validate_log_flags(format: &str, level: &str) -> anyhow::Result<()> {
    match format {
        "json" | "text" => {}
        other => anyhow::bail!("invalid log format: {other}"),
    }
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => anyhow::bail!("invalid log level: {other}"),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
