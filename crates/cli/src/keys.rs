// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive keypress listener.
//!
//! Puts the local terminal in raw mode and feeds single key bytes to the
//! controller over a channel. The reader runs on a blocking thread; it is
//! abandoned at process exit (stdin reads cannot be interrupted portably).

use std::io::{IsTerminal, Read};
use std::os::fd::AsFd;

use nix::sys::termios;
use tokio::sync::mpsc;
use tracing::debug;

/// RAII guard that restores the original terminal attributes on drop.
pub struct RawModeGuard {
    original: termios::Termios,
}

impl RawModeGuard {
    fn enter() -> anyhow::Result<Self> {
        let stdin = std::io::stdin();
        let original = termios::tcgetattr(stdin.as_fd())?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(stdin.as_fd(), termios::SetArg::TCSAFLUSH, &raw)?;
        Ok(Self { original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let stdin = std::io::stdin();
        let _ = termios::tcsetattr(stdin.as_fd(), termios::SetArg::TCSAFLUSH, &self.original);
    }
}

/// Start listening for keypresses.
///
/// Returns a receiver of raw key bytes plus the raw-mode guard, which the
/// caller must hold for the controller's lifetime. When `disabled` is set,
/// or stdin is not a terminal, the receiver never yields.
pub fn listen(disabled: bool) -> (mpsc::Receiver<u8>, Option<RawModeGuard>) {
    let (tx, rx) = mpsc::channel(16);

    if disabled || !std::io::stdin().is_terminal() {
        debug!("keypress listener disabled");
        return (rx, None);
    }

    let guard = match RawModeGuard::enter() {
        Ok(guard) => guard,
        Err(e) => {
            debug!("raw mode unavailable, keypresses disabled: {e}");
            return (rx, None);
        }
    };

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut handle = stdin.lock();
        let mut buf = [0u8; 1];
        loop {
            match handle.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.blocking_send(buf[0]).is_err() {
                        break;
                    }
                }
            }
        }
    });

    (rx, Some(guard))
}
