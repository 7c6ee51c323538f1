//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;

use derive_new::new;
use ipnetwork::Ipv6Network;
use nscale_utils::addr::AddressFamily;
use serde::{Deserialize, Serialize};

// Location of one sub-interface on the device.
//
// Index 0 addresses the untagged parent interface. Tagged sub-interfaces
// carry the VLAN identifier as their index.
#[derive(Clone, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct SubifPath {
    pub ifname: String,
    pub index: u32,
}

// Addressable locations in the device configuration tree.
//
// These are the targets of delete operations. Replace and update
// operations carry their payload through `config::ConfigEntry`, which
// embeds the same locations.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ConfigPath {
    Subinterface {
        at: SubifPath,
    },
    Address {
        at: SubifPath,
        ip: IpAddr,
    },
    Neighbor {
        at: SubifPath,
        ip: IpAddr,
    },
    // The learned (dynamic) neighbor cache of one address family. Distinct
    // from `Neighbor`, which names a configured static entry.
    NeighborCache {
        at: SubifPath,
        af: AddressFamily,
    },
    ProxyArp {
        at: SubifPath,
    },
    RouterAdvertisement {
        at: SubifPath,
    },
    Prefix {
        at: SubifPath,
        prefix: Ipv6Network,
    },
    Dad {
        at: SubifPath,
    },
    AggregateId {
        ifname: String,
    },
}

// ===== impl SubifPath =====

impl SubifPath {
    // Whether this path addresses the untagged parent interface.
    pub fn is_untagged(&self) -> bool {
        self.index == 0
    }
}

impl Display for SubifPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "interfaces/interface[{}]/subinterfaces/subinterface[{}]",
            self.ifname, self.index
        )
    }
}

// ===== impl ConfigPath =====

impl ConfigPath {
    pub fn ifname(&self) -> &str {
        match self {
            ConfigPath::Subinterface { at }
            | ConfigPath::Address { at, .. }
            | ConfigPath::Neighbor { at, .. }
            | ConfigPath::NeighborCache { at, .. }
            | ConfigPath::ProxyArp { at }
            | ConfigPath::RouterAdvertisement { at }
            | ConfigPath::Prefix { at, .. }
            | ConfigPath::Dad { at } => &at.ifname,
            ConfigPath::AggregateId { ifname } => ifname,
        }
    }
}

impl Display for ConfigPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ConfigPath::Subinterface { at } => write!(f, "{}", at),
            ConfigPath::Address { at, ip } => {
                write!(f, "{}/{}/addresses/address[{}]", at, af_segment(ip), ip)
            }
            ConfigPath::Neighbor { at, ip } => {
                write!(f, "{}/{}/neighbors/neighbor[{}]", at, af_segment(ip), ip)
            }
            ConfigPath::NeighborCache { at, af } => {
                let segment = match af {
                    AddressFamily::Ipv4 => "ipv4",
                    AddressFamily::Ipv6 => "ipv6",
                };
                write!(f, "{}/{}/neighbor-cache", at, segment)
            }
            ConfigPath::ProxyArp { at } => {
                write!(f, "{}/ipv4/proxy-arp", at)
            }
            ConfigPath::RouterAdvertisement { at } => {
                write!(f, "{}/ipv6/router-advertisement", at)
            }
            ConfigPath::Prefix { at, prefix } => {
                write!(
                    f,
                    "{}/ipv6/router-advertisement/prefixes/prefix[{}]",
                    at, prefix
                )
            }
            ConfigPath::Dad { at } => {
                write!(f, "{}/ipv6/duplicate-address-detection", at)
            }
            ConfigPath::AggregateId { ifname } => {
                write!(f, "interfaces/interface[{}]/aggregate-id", ifname)
            }
        }
    }
}

// ===== helper functions =====

fn af_segment(ip: &IpAddr) -> &'static str {
    match ip {
        IpAddr::V4(_) => "ipv4",
        IpAddr::V6(_) => "ipv6",
    }
}
