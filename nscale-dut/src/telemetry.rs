//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use derive_new::new;
use ipnetwork::IpNetwork;
use nscale_utils::addr::AddressFamily;
use nscale_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};

use crate::config::{DadConfig, PrefixConfig, ProxyArpMode, RaConfig};
use crate::path::SubifPath;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct PortFlags: u8 {
        const OPERATIVE = 0x01;
        const BUNDLE_MEMBER = 0x02;
    }
}

// Provenance of a neighbor entry as reported by the device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NeighborOrigin {
    Other,
    Static,
    Dynamic,
}

// IPv6 neighbor reachability, after RFC 4861 section 7.3.2. IPv4 ARP
// entries carry no reachability state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ReachabilityState {
    Incomplete,
    Reachable,
    Stale,
    Delay,
    Probe,
}

// One row of the device's neighbor table.
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NeighborEntry {
    pub ip: IpAddr,
    pub link_layer: Option<MacAddr>,
    pub origin: NeighborOrigin,
    pub is_router: bool,
    pub state: Option<ReachabilityState>,
    pub last_updated: DateTime<Utc>,
}

// Bulk-collected state of one (sub-interface, address family) pair.
//
// The IPv4 row carries the proxy-ARP mode, the IPv6 row the Router
// Advertisement block, advertised prefixes and DAD parameters.
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SubifSnapshot {
    pub at: SubifPath,
    pub af: AddressFamily,
    pub flags: PortFlags,
    pub addresses: Vec<IpNetwork>,
    pub neighbors: Vec<NeighborEntry>,
    pub proxy_arp: Option<ProxyArpMode>,
    pub router_advert: Option<RaConfig>,
    pub prefixes: Vec<PrefixConfig>,
    pub dad: Option<DadConfig>,
}

// ===== impl NeighborOrigin =====

impl Display for NeighborOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            NeighborOrigin::Other => write!(f, "other"),
            NeighborOrigin::Static => write!(f, "static"),
            NeighborOrigin::Dynamic => write!(f, "dynamic"),
        }
    }
}

// ===== impl ReachabilityState =====

impl Display for ReachabilityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ReachabilityState::Incomplete => write!(f, "incomplete"),
            ReachabilityState::Reachable => write!(f, "reachable"),
            ReachabilityState::Stale => write!(f, "stale"),
            ReachabilityState::Delay => write!(f, "delay"),
            ReachabilityState::Probe => write!(f, "probe"),
        }
    }
}
