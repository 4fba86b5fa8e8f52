// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error codes shared by the broker and worker RPC surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Dial or registration failure during job setup.
    Setup,
    /// Malformed or out-of-state request; fatal to the current job.
    Protocol,
    /// A neighbour connection was lost mid-generation.
    Peer,
    /// A job is already active at the broker.
    Busy,
    /// The simulation stopped at an iteration boundary; not a failure.
    Stopped,
    /// Board load/save failure at the controller.
    Io,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Protocol => "PROTOCOL",
            Self::Peer => "PEER",
            Self::Busy => "BUSY",
            Self::Stopped => "STOPPED",
            Self::Io => "IO",
            Self::Internal => "INTERNAL",
        }
    }

    /// Convert this error code into a [`tonic::Status`] with the given message.
    pub fn to_grpc_status(&self, message: impl Into<String>) -> tonic::Status {
        let code = match self {
            Self::Setup => tonic::Code::Unavailable,
            Self::Protocol => tonic::Code::InvalidArgument,
            Self::Peer => tonic::Code::Aborted,
            Self::Busy => tonic::Code::ResourceExhausted,
            Self::Stopped => tonic::Code::FailedPrecondition,
            Self::Io => tonic::Code::Internal,
            Self::Internal => tonic::Code::Internal,
        };
        tonic::Status::new(code, message)
    }
}

/// Whether a `GetRow` reply means the serving worker stopped at an iteration
/// boundary. The caller then stops at its own boundary instead of treating
/// the reply as a lost peer.
pub fn is_stop_status(status: &tonic::Status) -> bool {
    status.code() == tonic::Code::FailedPrecondition
}

/// Whether a broker reply means another job holds the slot.
pub fn is_busy_status(status: &tonic::Status) -> bool {
    status.code() == tonic::Code::ResourceExhausted
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
