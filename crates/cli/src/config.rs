// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Controller for the distributed Life engine.
#[derive(Debug, Parser)]
#[command(name = "gol", version, about)]
pub struct Config {
    /// Broker address (host:port).
    #[arg(long, env = "GOL_BROKER", default_value = "127.0.0.1:8030")]
    pub broker: String,

    /// Number of generations to run.
    #[arg(long, env = "GOL_TURNS", default_value = "100")]
    pub turns: u32,

    /// Per-worker compute thread hint.
    #[arg(long, env = "GOL_THREADS", default_value = "1")]
    pub threads: u32,

    /// Board width in cells.
    #[arg(long, env = "GOL_IMAGE_WIDTH", default_value = "512")]
    pub image_width: u32,

    /// Board height in cells.
    #[arg(long, env = "GOL_IMAGE_HEIGHT", default_value = "512")]
    pub image_height: u32,

    /// Directory the initial image is loaded from and results are saved to.
    #[arg(long, env = "GOL_IMAGES_DIR", default_value = "images")]
    pub images_dir: PathBuf,

    /// Resume the previously quit world instead of starting fresh.
    #[arg(long, env = "GOL_CONTINUE")]
    pub continue_previous: bool,

    /// Disable the interactive keypress listener.
    #[arg(long, env = "GOL_NO_INPUT")]
    pub no_input: bool,

    /// Log format (json or text).
    #[arg(long, env = "GOL_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "GOL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.image_width == 0 || self.image_height == 0 {
            anyhow::bail!("image dimensions must be positive");
        }
        if self.threads == 0 {
            anyhow::bail!("--threads must be at least 1");
        }
        if !self.broker.contains(':') {
            anyhow::bail!("broker address {} is missing a port", self.broker);
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => anyhow::bail!("invalid log level: {other}"),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
