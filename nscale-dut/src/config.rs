//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::IpAddr;
use std::time::Duration;

use derive_new::new;
use ipnetwork::{IpNetwork, Ipv6Network};
use nscale_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};

use crate::path::{ConfigPath, SubifPath};

// Sub-interface creation parameters.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SubinterfaceConfig {
    pub vlan_id: Option<u16>,
    pub enabled: bool,
}

// One interface address, carried together with its prefix length.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AddressConfig {
    pub prefix: IpNetwork,
}

// Static neighbor entry binding a protocol address to a link-layer
// address.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NeighborConfig {
    pub ip: IpAddr,
    pub link_layer: MacAddr,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ProxyArpMode {
    Disable,
    Remote,
    All,
}

// Router Advertisement parameters of one sub-interface.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RaConfig {
    pub interval: Duration,
    pub lifetime: Duration,
    pub suppress: bool,
    pub other_config: bool,
}

// One advertised on-link prefix.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PrefixConfig {
    pub prefix: Ipv6Network,
    pub preferred_lifetime: Duration,
    pub valid_lifetime: Duration,
    pub on_link: bool,
    pub autoconfig: bool,
}

// Duplicate Address Detection parameters.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DadConfig {
    pub transmits: u8,
}

// A configuration node together with its location, as carried by
// replace and update operations.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ConfigEntry {
    Subinterface {
        at: SubifPath,
        config: SubinterfaceConfig,
    },
    Address {
        at: SubifPath,
        config: AddressConfig,
    },
    Neighbor {
        at: SubifPath,
        config: NeighborConfig,
    },
    ProxyArp {
        at: SubifPath,
        mode: ProxyArpMode,
    },
    RouterAdvertisement {
        at: SubifPath,
        config: RaConfig,
    },
    Prefix {
        at: SubifPath,
        config: PrefixConfig,
    },
    Dad {
        at: SubifPath,
        config: DadConfig,
    },
    AggregateId {
        ifname: String,
        bundle: String,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum BatchOp {
    Replace(ConfigEntry),
    Update(ConfigEntry),
    Delete(ConfigPath),
}

// An ordered set of configuration operations applied as a single
// transaction. Either every operation takes effect or none does.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

// ===== impl ProxyArpMode =====

impl ProxyArpMode {
    // Mode a device reports when proxy-ARP is not configured.
    pub const DEVICE_DEFAULT: ProxyArpMode = ProxyArpMode::Disable;
}

impl Display for ProxyArpMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProxyArpMode::Disable => write!(f, "disable"),
            ProxyArpMode::Remote => write!(f, "remote"),
            ProxyArpMode::All => write!(f, "all"),
        }
    }
}

// ===== impl RaConfig =====

impl RaConfig {
    // Operational values a device reports when no explicit Router
    // Advertisement configuration is present (RFC 4861 section 6.2.1).
    // Telemetry alone cannot distinguish these from an identical
    // explicit configuration.
    pub const DEVICE_DEFAULT: RaConfig = RaConfig {
        interval: Duration::from_secs(600),
        lifetime: Duration::from_secs(1800),
        suppress: false,
        other_config: false,
    };
}

// ===== impl DadConfig =====

impl DadConfig {
    pub const DEVICE_DEFAULT: DadConfig = DadConfig { transmits: 1 };
}

// ===== impl ConfigEntry =====

impl ConfigEntry {
    // Location of the node this entry writes.
    pub fn path(&self) -> ConfigPath {
        match self {
            ConfigEntry::Subinterface { at, .. } => ConfigPath::Subinterface {
                at: at.clone(),
            },
            ConfigEntry::Address { at, config } => ConfigPath::Address {
                at: at.clone(),
                ip: config.prefix.ip(),
            },
            ConfigEntry::Neighbor { at, config } => ConfigPath::Neighbor {
                at: at.clone(),
                ip: config.ip,
            },
            ConfigEntry::ProxyArp { at, .. } => ConfigPath::ProxyArp {
                at: at.clone(),
            },
            ConfigEntry::RouterAdvertisement { at, .. } => {
                ConfigPath::RouterAdvertisement { at: at.clone() }
            }
            ConfigEntry::Prefix { at, config } => ConfigPath::Prefix {
                at: at.clone(),
                prefix: config.prefix,
            },
            ConfigEntry::Dad { at, .. } => ConfigPath::Dad { at: at.clone() },
            ConfigEntry::AggregateId { ifname, .. } => ConfigPath::AggregateId {
                ifname: ifname.clone(),
            },
        }
    }
}

// ===== impl BatchOp =====

impl Display for BatchOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BatchOp::Replace(entry) => write!(f, "replace {}", entry.path()),
            BatchOp::Update(entry) => write!(f, "update {}", entry.path()),
            BatchOp::Delete(path) => write!(f, "delete {}", path),
        }
    }
}

// ===== impl Batch =====

impl Batch {
    pub fn new() -> Batch {
        Batch::default()
    }

    pub fn replace(&mut self, entry: ConfigEntry) {
        self.ops.push(BatchOp::Replace(entry));
    }

    pub fn update(&mut self, entry: ConfigEntry) {
        self.ops.push(BatchOp::Update(entry));
    }

    pub fn delete(&mut self, path: ConfigPath) {
        self.ops.push(BatchOp::Delete(path));
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
