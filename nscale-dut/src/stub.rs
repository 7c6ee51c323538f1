//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

//! In-memory device used by the test suites.
//!
//! The stub keeps the full configuration tree of a device and models
//! the state machinery the harness depends on: committed addresses make
//! their subnet reachable, probing an address inside a configured
//! subnet installs a dynamic neighbor entry, cache flushes drop learned
//! entries but never static ones, and component reloads take ports down
//! and bring them back after a short boot delay.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ipnetwork::{IpNetwork, Ipv6Network};
use nscale_utils::Receiver;
use nscale_utils::addr::{AddressFamilies, AddressFamily, IpAddrExt};
use nscale_utils::mac_addr::MacAddr;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, warn};

use crate::config::{
    Batch, BatchOp, ConfigEntry, DadConfig, NeighborConfig, PrefixConfig,
    ProxyArpMode, RaConfig,
};
use crate::error::{CommitError, ControlError, PingError, TelemetryError};
use crate::path::{ConfigPath, SubifPath};
use crate::ping::{PingClient, PingReply};
use crate::store::{DeviceControl, DeviceStore};
use crate::telemetry::{
    NeighborEntry, NeighborOrigin, PortFlags, ReachabilityState, SubifSnapshot,
};

// How long a reloaded component keeps its ports down.
const BOOT_DELAY: Duration = Duration::from_millis(200);
const REBOOT_DELAY: Duration = Duration::from_millis(400);

// Control-plane processes the stub accepts restart requests for.
const PROCESSES: [&str; 2] = ["arp", "ipv6_nd"];

#[derive(Clone, Debug, Default)]
pub struct StubDevice {
    state: Arc<Mutex<StubState>>,
}

#[derive(Debug, Default)]
struct StubState {
    interfaces: BTreeMap<String, StubInterface>,
}

#[derive(Debug)]
struct StubInterface {
    flags: PortFlags,
    aggregate: Option<String>,
    subifs: BTreeMap<u32, StubSubif>,
}

#[derive(Debug, Default)]
struct StubSubif {
    vlan_id: Option<u16>,
    enabled: bool,
    families: AddressFamilies<StubAfState>,
    proxy_arp: Option<ProxyArpMode>,
    router_advert: Option<RaConfig>,
    prefixes: BTreeMap<Ipv6Network, PrefixConfig>,
    dad: Option<DadConfig>,
}

#[derive(Debug, Default)]
struct StubAfState {
    // Configured addresses, keyed by host address.
    addresses: BTreeMap<IpAddr, IpNetwork>,
    // Configured static neighbors.
    static_neighbors: BTreeMap<IpAddr, NeighborConfig>,
    // Entries learned through probing.
    learned: BTreeMap<IpAddr, NeighborEntry>,
}

// ===== impl StubDevice =====

impl StubDevice {
    pub fn new() -> StubDevice {
        StubDevice::default()
    }

    // Creates a device pre-seeded with the given physical interfaces,
    // all operational. Logical interfaces (bundles) come into existence
    // through configuration instead.
    pub fn with_interfaces<'a>(
        names: impl IntoIterator<Item = &'a str>,
    ) -> StubDevice {
        let device = StubDevice::new();
        {
            let mut state = device.state.lock().unwrap();
            for name in names {
                state
                    .interfaces
                    .insert(name.to_owned(), StubInterface::new());
            }
        }
        device
    }
}

#[async_trait]
impl DeviceStore for StubDevice {
    async fn interface_names(&self) -> Result<Vec<String>, TelemetryError> {
        let state = self.state.lock().unwrap();
        Ok(state.interfaces.keys().cloned().collect())
    }

    async fn port_flags(
        &self,
        ifname: &str,
    ) -> Result<PortFlags, TelemetryError> {
        let state = self.state.lock().unwrap();
        state
            .interfaces
            .get(ifname)
            .map(|iface| iface.flags)
            .ok_or_else(|| TelemetryError::UnknownInterface(ifname.to_owned()))
    }

    async fn neighbor(
        &self,
        at: &SubifPath,
        ip: IpAddr,
    ) -> Result<Option<NeighborEntry>, TelemetryError> {
        let state = self.state.lock().unwrap();
        let Some(iface) = state.interfaces.get(&at.ifname) else {
            return Ok(None);
        };
        // Ports of a reloading component answer nothing.
        if !iface.flags.contains(PortFlags::OPERATIVE) {
            return Ok(None);
        }
        let Some(subif) = iface.subifs.get(&at.index) else {
            return Ok(None);
        };
        let af_state = subif.families.get(ip.address_family());
        if let Some(config) = af_state.static_neighbors.get(&ip) {
            return Ok(Some(static_entry(config)));
        }
        Ok(af_state.learned.get(&ip).cloned())
    }

    async fn subif(
        &self,
        at: &SubifPath,
        af: AddressFamily,
    ) -> Result<Option<SubifSnapshot>, TelemetryError> {
        let state = self.state.lock().unwrap();
        let Some(iface) = state.interfaces.get(&at.ifname) else {
            return Ok(None);
        };
        let Some(subif) = iface.subifs.get(&at.index) else {
            return Ok(None);
        };
        Ok(Some(snapshot_row(at.clone(), af, iface.flags, subif)))
    }

    async fn collect(
        &self,
        _window: Duration,
    ) -> Result<Vec<SubifSnapshot>, TelemetryError> {
        let state = self.state.lock().unwrap();
        let mut rows = Vec::new();
        for (ifname, iface) in &state.interfaces {
            for (index, subif) in &iface.subifs {
                let at = SubifPath::new(ifname.clone(), *index);
                for af in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
                    if subif.has_content(af) {
                        rows.push(snapshot_row(
                            at.clone(),
                            af,
                            iface.flags,
                            subif,
                        ));
                    }
                }
            }
        }
        Ok(rows)
    }

    async fn commit(&self, batch: Batch) -> Result<(), CommitError> {
        let mut state = self.state.lock().unwrap();
        if let Err(error) = state.validate(&batch) {
            warn!(%error, "commit rejected");
            return Err(error);
        }
        for op in batch.ops() {
            state.apply(op);
        }
        debug!(ops = batch.len(), "batch committed");
        Ok(())
    }
}

#[async_trait]
impl DeviceControl for StubDevice {
    async fn reload_component(
        &self,
        component: &str,
    ) -> Result<(), ControlError> {
        {
            let mut state = self.state.lock().unwrap();
            let members = state.component_members(component);
            if members.is_empty() {
                return Err(ControlError::UnknownComponent(
                    component.to_owned(),
                ));
            }
            for ifname in &members {
                if let Some(iface) = state.interfaces.get_mut(ifname) {
                    iface.take_down();
                }
            }
            debug!(%component, ports = members.len(), "component reloading");
        }
        self.recover_after(BOOT_DELAY, Some(component.to_owned()));
        Ok(())
    }

    async fn restart_process(&self, process: &str) -> Result<(), ControlError> {
        if !PROCESSES.contains(&process) {
            return Err(ControlError::UnknownProcess(process.to_owned()));
        }
        let af = match process {
            "arp" => AddressFamily::Ipv4,
            _ => AddressFamily::Ipv6,
        };
        let mut state = self.state.lock().unwrap();
        for iface in state.interfaces.values_mut() {
            for subif in iface.subifs.values_mut() {
                subif.families.get_mut(af).learned.clear();
            }
        }
        debug!(%process, "process restarted");
        Ok(())
    }

    async fn reboot(&self) -> Result<(), ControlError> {
        {
            let mut state = self.state.lock().unwrap();
            for iface in state.interfaces.values_mut() {
                iface.take_down();
            }
            debug!("device rebooting");
        }
        self.recover_after(REBOOT_DELAY, None);
        Ok(())
    }
}

#[async_trait]
impl PingClient for StubDevice {
    async fn ping(
        &self,
        dst: IpAddr,
        count: u32,
    ) -> Result<Receiver<PingReply>, PingError> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.probe(dst)
        };
        match outcome {
            ProbeOutcome::Answered => Ok(reply_stream(dst, count)),
            ProbeOutcome::Silent => {
                // Covered subnet on a port that is down. Zero replies,
                // not an error.
                let (_tx, rx) = mpsc::channel(1);
                Ok(rx)
            }
            ProbeOutcome::NoRoute => Err(PingError::Unreachable(dst)),
        }
    }
}

impl StubDevice {
    // Restores OPERATIVE on the named component's ports, or on every
    // port, after the boot delay has passed.
    fn recover_after(&self, delay: Duration, component: Option<String>) {
        let state = self.state.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            let mut state = state.lock().unwrap();
            let members = match &component {
                Some(component) => state.component_members(component),
                None => state.interfaces.keys().cloned().collect(),
            };
            for ifname in members {
                if let Some(iface) = state.interfaces.get_mut(&ifname) {
                    iface.flags.insert(PortFlags::OPERATIVE);
                }
            }
        });
    }
}

// ===== impl StubState =====

impl StubState {
    // Checks every operation of the batch before anything is applied.
    // Sub-interfaces created earlier in the batch satisfy references
    // made later in it.
    fn validate(&self, batch: &Batch) -> Result<(), CommitError> {
        let mut created = BTreeSet::new();
        for op in batch.ops() {
            let entry = match op {
                BatchOp::Replace(entry) | BatchOp::Update(entry) => entry,
                // Deleting an absent node is a no-op.
                BatchOp::Delete(_) => continue,
            };
            match entry {
                ConfigEntry::Subinterface { at, .. } => {
                    created.insert((at.ifname.clone(), at.index));
                }
                ConfigEntry::AggregateId { ifname, .. } => {
                    if !self.interfaces.contains_key(ifname) {
                        return Err(CommitError::UnknownInterface(
                            ifname.clone(),
                        ));
                    }
                }
                ConfigEntry::Address { at, .. }
                | ConfigEntry::Neighbor { at, .. }
                | ConfigEntry::ProxyArp { at, .. }
                | ConfigEntry::RouterAdvertisement { at, .. }
                | ConfigEntry::Prefix { at, .. }
                | ConfigEntry::Dad { at, .. } => {
                    if created.contains(&(at.ifname.clone(), at.index)) {
                        continue;
                    }
                    match self.interfaces.get(&at.ifname) {
                        Some(iface) => {
                            if !iface.subifs.contains_key(&at.index) {
                                return Err(CommitError::UnknownSubinterface(
                                    at.clone(),
                                ));
                            }
                        }
                        None => {
                            return Err(CommitError::UnknownInterface(
                                at.ifname.clone(),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: &BatchOp) {
        match op {
            BatchOp::Replace(entry) | BatchOp::Update(entry) => {
                self.apply_entry(entry)
            }
            BatchOp::Delete(path) => self.apply_delete(path),
        }
    }

    fn apply_entry(&mut self, entry: &ConfigEntry) {
        match entry {
            ConfigEntry::Subinterface { at, config } => {
                let subif = self.subif_entry(at);
                subif.vlan_id = config.vlan_id;
                subif.enabled = config.enabled;
            }
            ConfigEntry::Address { at, config } => {
                let af = config.prefix.ip().address_family();
                self.subif_entry(at)
                    .families
                    .get_mut(af)
                    .addresses
                    .insert(config.prefix.ip(), config.prefix);
            }
            ConfigEntry::Neighbor { at, config } => {
                let af = config.ip.address_family();
                self.subif_entry(at)
                    .families
                    .get_mut(af)
                    .static_neighbors
                    .insert(config.ip, *config);
            }
            ConfigEntry::ProxyArp { at, mode } => {
                self.subif_entry(at).proxy_arp = Some(*mode);
            }
            ConfigEntry::RouterAdvertisement { at, config } => {
                self.subif_entry(at).router_advert = Some(*config);
            }
            ConfigEntry::Prefix { at, config } => {
                self.subif_entry(at).prefixes.insert(config.prefix, *config);
            }
            ConfigEntry::Dad { at, config } => {
                self.subif_entry(at).dad = Some(*config);
            }
            ConfigEntry::AggregateId { ifname, bundle } => {
                self.interfaces
                    .entry(bundle.clone())
                    .or_insert_with(StubInterface::new);
                if let Some(iface) = self.interfaces.get_mut(ifname) {
                    iface.aggregate = Some(bundle.clone());
                    iface.flags.insert(PortFlags::BUNDLE_MEMBER);
                }
            }
        }
    }

    fn apply_delete(&mut self, path: &ConfigPath) {
        match path {
            ConfigPath::Subinterface { at } => {
                if let Some(iface) = self.interfaces.get_mut(&at.ifname) {
                    iface.subifs.remove(&at.index);
                }
            }
            ConfigPath::Address { at, ip } => {
                if let Some(subif) = self.subif_mut(at) {
                    let af_state = subif.families.get_mut(ip.address_family());
                    // Learned entries die with their subnet.
                    if let Some(prefix) = af_state.addresses.remove(ip) {
                        af_state
                            .learned
                            .retain(|nbr, _| !prefix.contains(*nbr));
                    }
                }
            }
            ConfigPath::Neighbor { at, ip } => {
                if let Some(subif) = self.subif_mut(at) {
                    subif
                        .families
                        .get_mut(ip.address_family())
                        .static_neighbors
                        .remove(ip);
                }
            }
            ConfigPath::NeighborCache { at, af } => {
                if let Some(subif) = self.subif_mut(at) {
                    subif.families.get_mut(*af).learned.clear();
                }
            }
            ConfigPath::ProxyArp { at } => {
                if let Some(subif) = self.subif_mut(at) {
                    subif.proxy_arp = None;
                }
            }
            ConfigPath::RouterAdvertisement { at } => {
                if let Some(subif) = self.subif_mut(at) {
                    subif.router_advert = None;
                }
            }
            ConfigPath::Prefix { at, prefix } => {
                if let Some(subif) = self.subif_mut(at) {
                    subif.prefixes.remove(prefix);
                }
            }
            ConfigPath::Dad { at } => {
                if let Some(subif) = self.subif_mut(at) {
                    subif.dad = None;
                }
            }
            ConfigPath::AggregateId { ifname } => {
                if let Some(iface) = self.interfaces.get_mut(ifname) {
                    iface.aggregate = None;
                    iface.flags.remove(PortFlags::BUNDLE_MEMBER);
                }
            }
        }
    }

    fn subif_entry(&mut self, at: &SubifPath) -> &mut StubSubif {
        self.interfaces
            .entry(at.ifname.clone())
            .or_insert_with(StubInterface::new)
            .subifs
            .entry(at.index)
            .or_default()
    }

    fn subif_mut(&mut self, at: &SubifPath) -> Option<&mut StubSubif> {
        self.interfaces
            .get_mut(&at.ifname)?
            .subifs
            .get_mut(&at.index)
    }

    // Interfaces hosted on the given rack/slot component.
    fn component_members(&self, component: &str) -> Vec<String> {
        self.interfaces
            .keys()
            .filter(|ifname| on_component(ifname, component))
            .cloned()
            .collect()
    }

    // Resolves a probe destination against the configured subnets and
    // installs a learned entry when the destination answers.
    fn probe(&mut self, dst: IpAddr) -> ProbeOutcome {
        let af = dst.address_family();
        for iface in self.interfaces.values_mut() {
            let operative = iface.flags.contains(PortFlags::OPERATIVE);
            for subif in iface.subifs.values_mut() {
                let af_state = subif.families.get_mut(af);
                let Some(prefix) = af_state
                    .addresses
                    .values()
                    .find(|prefix| prefix.contains(dst))
                    .copied()
                else {
                    continue;
                };
                if !operative {
                    return ProbeOutcome::Silent;
                }
                // The device's own address answers without a cache
                // entry; so do configured static neighbors.
                if dst != prefix.ip()
                    && !af_state.static_neighbors.contains_key(&dst)
                {
                    af_state.learned.insert(dst, learned_entry(dst));
                }
                return ProbeOutcome::Answered;
            }
        }
        ProbeOutcome::NoRoute
    }
}

// ===== impl StubInterface =====

impl StubInterface {
    fn new() -> StubInterface {
        StubInterface {
            flags: PortFlags::OPERATIVE,
            aggregate: None,
            subifs: Default::default(),
        }
    }

    // Port outage: the link drops and the neighbor caches flush.
    fn take_down(&mut self) {
        self.flags.remove(PortFlags::OPERATIVE);
        for subif in self.subifs.values_mut() {
            subif.families.ipv4.learned.clear();
            subif.families.ipv6.learned.clear();
        }
    }
}

// ===== impl StubSubif =====

impl StubSubif {
    fn has_content(&self, af: AddressFamily) -> bool {
        let af_state = self.families.get(af);
        if !af_state.addresses.is_empty()
            || !af_state.static_neighbors.is_empty()
            || !af_state.learned.is_empty()
        {
            return true;
        }
        match af {
            AddressFamily::Ipv4 => self.proxy_arp.is_some(),
            AddressFamily::Ipv6 => {
                self.router_advert.is_some()
                    || !self.prefixes.is_empty()
                    || self.dad.is_some()
            }
        }
    }
}

// ===== helper types and functions =====

enum ProbeOutcome {
    Answered,
    Silent,
    NoRoute,
}

fn static_entry(config: &NeighborConfig) -> NeighborEntry {
    let is_v6 = config.ip.is_ipv6();
    NeighborEntry::new(
        config.ip,
        Some(config.link_layer),
        NeighborOrigin::Static,
        is_v6,
        is_v6.then_some(ReachabilityState::Reachable),
        Utc::now(),
    )
}

fn learned_entry(ip: IpAddr) -> NeighborEntry {
    let is_v6 = ip.is_ipv6();
    NeighborEntry::new(
        ip,
        Some(MacAddr::from_ip(&ip)),
        NeighborOrigin::Dynamic,
        is_v6,
        is_v6.then_some(ReachabilityState::Reachable),
        Utc::now(),
    )
}

fn snapshot_row(
    at: SubifPath,
    af: AddressFamily,
    flags: PortFlags,
    subif: &StubSubif,
) -> SubifSnapshot {
    let af_state = subif.families.get(af);
    let addresses = af_state.addresses.values().copied().collect();
    // Ports of a reloading component answer nothing.
    let neighbors = if flags.contains(PortFlags::OPERATIVE) {
        let mut neighbors = af_state.learned.clone();
        for (ip, config) in &af_state.static_neighbors {
            neighbors.insert(*ip, static_entry(config));
        }
        neighbors.into_values().collect()
    } else {
        Vec::new()
    };
    // Unconfigured ND leaves report operational defaults, so "still
    // default" and "explicitly reset to default" read identically. A
    // deleted prefix entry simply disappears.
    let (proxy_arp, router_advert, prefixes, dad) = match af {
        AddressFamily::Ipv4 => (
            Some(subif.proxy_arp.unwrap_or(ProxyArpMode::DEVICE_DEFAULT)),
            None,
            Vec::new(),
            None,
        ),
        AddressFamily::Ipv6 => (
            None,
            Some(subif.router_advert.unwrap_or(RaConfig::DEVICE_DEFAULT)),
            subif.prefixes.values().copied().collect(),
            Some(subif.dad.unwrap_or(DadConfig::DEVICE_DEFAULT)),
        ),
    };
    SubifSnapshot::new(
        at,
        af,
        flags,
        addresses,
        neighbors,
        proxy_arp,
        router_advert,
        prefixes,
        dad,
    )
}

// Whether an interface name places the port on the given rack/slot
// component ("FourHundredGigE0/0/0/3" is on "0/0").
fn on_component(ifname: &str, component: &str) -> bool {
    let Some(pos) = ifname.find(|c: char| c.is_ascii_digit()) else {
        return false;
    };
    let mut location = ifname[pos..].split('/');
    component
        .split('/')
        .all(|wanted| location.next() == Some(wanted))
}

fn reply_stream(dst: IpAddr, count: u32) -> Receiver<PingReply> {
    let (tx, rx) = mpsc::channel(count.max(1) as usize);
    tokio::spawn(async move {
        for seq in 1..=count {
            time::sleep(Duration::from_millis(1)).await;
            let reply = PingReply::new(seq, dst, Duration::from_millis(1));
            if tx.send(reply).await.is_err() {
                break;
            }
        }
    });
    rx
}

// ===== tests =====
