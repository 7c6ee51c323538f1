//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

// The set of devices a run operates on, keyed by device identifier.
#[derive(Clone, Debug, Default)]
#[derive(Deserialize, Serialize)]
pub struct Testbed {
    duts: BTreeMap<String, Dut>,
}

// One device and its reserved ports. Ports are registered under logical
// names ("port1") and resolved to the physical interface names the
// device actually exposes.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct Dut {
    id: String,
    ports: BTreeMap<String, String>,
}

// ===== impl Testbed =====

impl Testbed {
    pub fn new() -> Testbed {
        Testbed::default()
    }

    pub fn insert(&mut self, dut: Dut) {
        self.duts.insert(dut.id.clone(), dut);
    }

    pub fn dut(&self, id: &str) -> Result<&Dut, TopologyError> {
        self.duts
            .get(id)
            .ok_or_else(|| TopologyError::UnknownDut(id.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dut> {
        self.duts.values()
    }
}

// ===== impl Dut =====

impl Dut {
    pub fn new(id: &str) -> Dut {
        Dut {
            id: id.to_owned(),
            ports: Default::default(),
        }
    }

    pub fn with_port(mut self, logical: &str, physical: &str) -> Dut {
        self.ports.insert(logical.to_owned(), physical.to_owned());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn port(&self, logical: &str) -> Result<&str, TopologyError> {
        self.ports
            .get(logical)
            .map(String::as_str)
            .ok_or_else(|| TopologyError::UnknownPort {
                dut: self.id.clone(),
                port: logical.to_owned(),
            })
    }

    // Physical names of every reserved port, in logical-name order.
    pub fn ports(&self) -> impl Iterator<Item = &str> {
        self.ports.values().map(String::as_str)
    }
}
