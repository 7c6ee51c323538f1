//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use nscale_utils::addr::AddressFamily;
use tracing::{debug, debug_span};

use crate::alloc::Layer;
use crate::validator::ValidationReport;
use crate::verifier::ProbeStats;

// Harness debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Provisioning
    GroupsClassified(usize),
    BatchCommitted(Layer, AddressFamily, usize),
    TriggerRun(&'a str),
    // Verification
    ProbeSilent(&'a IpAddr),
    ProbeRound(&'a ProbeStats),
    IndexBuilt(usize),
    ValidationOutcome(&'a ValidationReport),
}

// ===== impl Debug =====

impl<'a> Debug<'a> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::GroupsClassified(groups) => {
                debug!(%groups, "{}", self);
            }
            Debug::BatchCommitted(layer, af, ops) => {
                debug!(%layer, %af, %ops, "{}", self);
            }
            Debug::TriggerRun(name) => {
                debug!(%name, "{}", self);
            }
            Debug::ProbeSilent(dst) => {
                // Parent span(s): probing
                debug!(%dst, "{}", self);
            }
            Debug::ProbeRound(stats) => {
                debug_span!("probing").in_scope(|| {
                    let data = serde_json::to_string(&stats).unwrap();
                    debug!(%data, "{}", self);
                })
            }
            Debug::IndexBuilt(addresses) => {
                debug!(%addresses, "{}", self);
            }
            Debug::ValidationOutcome(report) => {
                debug_span!("validation").in_scope(|| {
                    let data = serde_json::to_string(&report).unwrap();
                    debug!(%data, "{}", self);
                })
            }
        }
    }
}

impl<'a> std::fmt::Display for Debug<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::GroupsClassified(..) => {
                write!(f, "interfaces classified")
            }
            Debug::BatchCommitted(..) => {
                write!(f, "configuration batch committed")
            }
            Debug::TriggerRun(..) => {
                write!(f, "running trigger")
            }
            Debug::ProbeSilent(..) => {
                write!(f, "no probe replies")
            }
            Debug::ProbeRound(..) => {
                write!(f, "probe round finished")
            }
            Debug::IndexBuilt(..) => {
                write!(f, "address index built")
            }
            Debug::ValidationOutcome(..) => {
                write!(f, "validation finished")
            }
        }
    }
}
