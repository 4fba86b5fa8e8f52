// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::{BrokerConfig, WorkerConfig};

#[test]
fn broker_defaults() -> anyhow::Result<()> {
    let config = BrokerConfig::parse_from(["gol-broker"]);
    config.validate()?;
    assert_eq!(config.port, 8030);
    assert_eq!(config.worker_addrs().len(), 4);
    assert_eq!(config.worker_addrs()[0], "127.0.0.1:8040");
    Ok(())
}

#[test]
fn broker_worker_list_is_trimmed() -> anyhow::Result<()> {
    let config = BrokerConfig::parse_from([
        "gol-broker",
        "--workers",
        " 10.0.0.1:9000, 10.0.0.2:9000 ",
    ]);
    config.validate()?;
    assert_eq!(config.worker_addrs(), vec!["10.0.0.1:9000", "10.0.0.2:9000"]);
    Ok(())
}

#[test]
fn broker_rejects_empty_worker_list() {
    let config = BrokerConfig::parse_from(["gol-broker", "--workers", " , "]);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("at least one"), "unexpected error: {err}");
}

#[test]
fn broker_rejects_address_without_port() {
    let config = BrokerConfig::parse_from(["gol-broker", "--workers", "10.0.0.1"]);
    assert!(config.validate().is_err());
}

#[test]
fn worker_defaults() -> anyhow::Result<()> {
    let config = WorkerConfig::parse_from(["gol-worker"]);
    config.validate()?;
    assert_eq!(config.port, 8040);
    assert_eq!(config.log_format, "text");
    Ok(())
}

#[test]
fn invalid_log_format_is_rejected() {
    let config = WorkerConfig::parse_from(["gol-worker", "--log-format", "xml"]);
    assert!(config.validate().is_err());
}
