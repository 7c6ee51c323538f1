//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

// 48-bit MAC address (IEEE EUI-48 format).
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct MacAddr([u8; 6]);

// ===== impl MacAddr =====

impl MacAddr {
    // Returns true if this is the all-zeroes address, which is how an
    // unresolved neighbor-table entry reports its link-layer address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 6]
    }

    // Derives a locally administered unicast MAC address from an IP
    // address. The mapping is deterministic, so the same IP always
    // yields the same link-layer address.
    pub fn from_ip(addr: &IpAddr) -> MacAddr {
        match addr {
            IpAddr::V4(addr) => {
                let octets = addr.octets();
                MacAddr([
                    0x02, 0x04, octets[0], octets[1], octets[2], octets[3],
                ])
            }
            IpAddr::V6(addr) => {
                let octets = addr.octets();
                MacAddr([
                    0x02, 0x06, octets[12], octets[13], octets[14], octets[15],
                ])
            }
        }
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        ))
    }
}

// ===== unit tests =====
