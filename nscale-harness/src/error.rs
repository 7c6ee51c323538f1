//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use nscale_dut::error::{CommitError, ControlError, PingError, TelemetryError};
use tracing::warn;

// Harness errors.
#[derive(Debug)]
pub enum Error {
    // structural errors
    InsufficientPorts { found: usize, required: usize },
    BundleOwnership { port: String, owner: String },
    BundleCapacity { bundle: String },

    // collaborator errors
    Commit(CommitError),
    Telemetry(TelemetryError),
    Control(ControlError),
    Probe(PingError),

    // convergence waits that ran out of deadline
    Convergence { what: String, deadline: Duration },
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::InsufficientPorts { found, required } => {
                warn!(%found, %required, "{}", self);
            }
            Error::BundleOwnership { port, owner } => {
                warn!(%port, %owner, "{}", self);
            }
            Error::BundleCapacity { bundle } => {
                warn!(%bundle, "{}", self);
            }
            Error::Commit(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::Telemetry(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::Control(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::Probe(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::Convergence { what, deadline } => {
                warn!(%what, ?deadline, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InsufficientPorts { .. } => {
                write!(f, "not enough matching ports on the line card")
            }
            Error::BundleOwnership { .. } => {
                write!(f, "port is already a member of another bundle")
            }
            Error::BundleCapacity { .. } => {
                write!(f, "bundle already has its full member set")
            }
            Error::Commit(..) => {
                write!(f, "failed to commit configuration batch")
            }
            Error::Telemetry(..) => {
                write!(f, "failed to read device telemetry")
            }
            Error::Control(..) => {
                write!(f, "device control operation failed")
            }
            Error::Probe(..) => {
                write!(f, "reachability probe failed")
            }
            Error::Convergence { .. } => {
                write!(f, "convergence deadline exceeded")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Commit(error) => Some(error),
            Error::Telemetry(error) => Some(error),
            Error::Control(error) => Some(error),
            Error::Probe(error) => Some(error),
            _ => None,
        }
    }
}

impl From<CommitError> for Error {
    fn from(error: CommitError) -> Error {
        Error::Commit(error)
    }
}

impl From<TelemetryError> for Error {
    fn from(error: TelemetryError) -> Error {
        Error::Telemetry(error)
    }
}

impl From<ControlError> for Error {
    fn from(error: ControlError) -> Error {
        Error::Control(error)
    }
}

impl From<PingError> for Error {
    fn from(error: PingError) -> Error {
        Error::Probe(error)
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
