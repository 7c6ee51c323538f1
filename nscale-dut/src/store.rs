//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use nscale_utils::addr::AddressFamily;

use crate::config::Batch;
use crate::error::{CommitError, ControlError, TelemetryError};
use crate::path::SubifPath;
use crate::telemetry::{NeighborEntry, PortFlags, SubifSnapshot};

// Configuration and telemetry session toward one device.
//
// Writes go through transactional batches. Reads come in two shapes:
// pointwise getters for single leaves and `collect` for one bulk
// snapshot of the whole interface tree.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    // Names of every interface present on the device, physical and
    // logical.
    async fn interface_names(&self) -> Result<Vec<String>, TelemetryError>;

    async fn port_flags(&self, ifname: &str)
        -> Result<PortFlags, TelemetryError>;

    // Pointwise read of one neighbor entry, searching both the static
    // and the learned tables.
    async fn neighbor(
        &self,
        at: &SubifPath,
        ip: IpAddr,
    ) -> Result<Option<NeighborEntry>, TelemetryError>;

    // Pointwise read of one (sub-interface, address family) row.
    async fn subif(
        &self,
        at: &SubifPath,
        af: AddressFamily,
    ) -> Result<Option<SubifSnapshot>, TelemetryError>;

    // Bulk snapshot of every sub-interface row. `window` bounds how
    // long the device may take to stream the snapshot out.
    async fn collect(
        &self,
        window: Duration,
    ) -> Result<Vec<SubifSnapshot>, TelemetryError>;

    // Applies one transaction. A rejected batch leaves the device
    // untouched.
    async fn commit(&self, batch: Batch) -> Result<(), CommitError>;
}

// Disruptive maintenance operations of one device.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    // Reloads one hardware component, named by its rack/slot location
    // ("0/0"). Ports hosted on the component go down and come back.
    async fn reload_component(&self, component: &str)
        -> Result<(), ControlError>;

    // Restarts one control-plane process by name.
    async fn restart_process(&self, process: &str) -> Result<(), ControlError>;

    // Reboots the whole device.
    async fn reboot(&self) -> Result<(), ControlError>;
}
