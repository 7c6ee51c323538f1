//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;

use crate::path::SubifPath;

// Rejection of a configuration transaction. The whole batch is
// discarded; no operation of a rejected batch takes effect.
#[derive(Debug)]
pub enum CommitError {
    UnknownInterface(String),
    UnknownSubinterface(SubifPath),
}

#[derive(Debug)]
pub enum TelemetryError {
    UnknownInterface(String),
}

#[derive(Debug)]
pub enum PingError {
    Unreachable(IpAddr),
}

#[derive(Debug)]
pub enum ControlError {
    UnknownComponent(String),
    UnknownProcess(String),
}

#[derive(Debug)]
pub enum TopologyError {
    UnknownDut(String),
    UnknownPort { dut: String, port: String },
}

// ===== impl CommitError =====

impl Display for CommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CommitError::UnknownInterface(ifname) => {
                write!(f, "unknown interface: {}", ifname)
            }
            CommitError::UnknownSubinterface(at) => {
                write!(f, "unknown sub-interface: {}", at)
            }
        }
    }
}

impl std::error::Error for CommitError {}

// ===== impl TelemetryError =====

impl Display for TelemetryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TelemetryError::UnknownInterface(ifname) => {
                write!(f, "unknown interface: {}", ifname)
            }
        }
    }
}

impl std::error::Error for TelemetryError {}

// ===== impl PingError =====

impl Display for PingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PingError::Unreachable(addr) => {
                write!(f, "no route to host: {}", addr)
            }
        }
    }
}

impl std::error::Error for PingError {}

// ===== impl ControlError =====

impl Display for ControlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ControlError::UnknownComponent(name) => {
                write!(f, "unknown component: {}", name)
            }
            ControlError::UnknownProcess(name) => {
                write!(f, "unknown process: {}", name)
            }
        }
    }
}

impl std::error::Error for ControlError {}

// ===== impl TopologyError =====

impl Display for TopologyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TopologyError::UnknownDut(dut) => {
                write!(f, "unknown device: {}", dut)
            }
            TopologyError::UnknownPort { dut, port } => {
                write!(f, "unknown port {} on device {}", port, dut)
            }
        }
    }
}

impl std::error::Error for TopologyError {}
