//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use serde::{Deserialize, Serialize};

// Shape of one scale run.
//
// The defaults mirror the reference testbed: two speed classes, eight
// line-card slots, nine ports per card of which five carry addresses
// directly and two serve as bundle members.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Profile {
    // Interface-name prefixes of the matched speed classes.
    pub name_prefixes: Vec<String>,
    // Line-card slots probed on rack 0.
    pub slots: u8,
    // Ports each classified line-card bucket must provide. A bucket
    // below this capacity fails the run before any write.
    pub ports_per_card: usize,
    // Ports per card addressed directly (physical layers).
    pub physical_ports: usize,
    // Bundles created per line-card group; each takes one member port
    // from each card of the group.
    pub bundle_count: usize,
    // Tagged sub-interfaces created per addressed port and per bundle.
    pub subifs_per_port: u16,
    // VLAN identifier of the first tagged sub-interface.
    pub vlan_base: u16,
    // Window granted to one bulk telemetry collection.
    pub collect_window: Duration,
}

// ===== impl Profile =====

impl Profile {
    // Ports consumed per card: the addressed physical ports plus one
    // bundle member per bundle.
    pub fn ports_required(&self) -> usize {
        self.physical_ports + self.bundle_count
    }

    // VLAN identifiers of the tagged sub-interfaces, in creation order.
    // The VLAN identifier doubles as the sub-interface index.
    pub fn subif_vlans(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.subifs_per_port).map(|offset| self.vlan_base + offset)
    }

    // Addresses provisioned per line-card group for one address family.
    pub fn addresses_per_group(&self) -> usize {
        let physical = 2 * self.physical_ports;
        let subifs = usize::from(self.subifs_per_port);
        physical + physical * subifs
            + self.bundle_count
            + self.bundle_count * subifs
    }
}

impl Default for Profile {
    fn default() -> Profile {
        Profile {
            name_prefixes: vec![
                "FourHundredGigE".to_owned(),
                "HundredGigE".to_owned(),
            ],
            slots: 8,
            ports_per_card: 9,
            physical_ports: 5,
            bundle_count: 2,
            subifs_per_port: 10,
            vlan_base: 100,
            collect_window: Duration::from_secs(30),
        }
    }
}
