//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use derive_new::new;
use enum_as_inner::EnumAsInner;
use ipnetwork::IpNetwork;
use nscale_dut::config::{DadConfig, PrefixConfig, ProxyArpMode, RaConfig};
use nscale_dut::path::SubifPath;
use nscale_dut::ping::PingClient;
use nscale_dut::store::DeviceStore;
use nscale_dut::telemetry::{
    NeighborEntry, NeighborOrigin, ReachabilityState,
};
use nscale_utils::addr::{AddressFamily, IpAddrExt};
use nscale_utils::task::TaskGroup;
use serde::Serialize;

use crate::builder::Provisioned;
use crate::consts::{PROBE_CONCURRENCY, PROBE_COUNT};
use crate::debug::Debug;
use crate::error::Error;
use crate::profile::Profile;

// Neighbor-discovery state of one collected row, per address family.
#[derive(Clone, Debug)]
#[derive(EnumAsInner)]
pub enum NdState {
    ProxyArp {
        mode: Option<ProxyArpMode>,
    },
    RouterAdvert {
        ra: Option<RaConfig>,
        prefixes: Vec<PrefixConfig>,
        dad: Option<DadConfig>,
    },
}

// Collected state of one interface address.
#[derive(Clone, Debug)]
pub struct AddressRecord {
    pub at: SubifPath,
    pub prefix: IpNetwork,
    pub addresses: Vec<IpNetwork>,
    pub neighbors: BTreeMap<IpAddr, NeighborEntry>,
    pub nd: NdState,
}

// Address-to-record index built from one bulk collection, discarded
// after the validation pass that consumes it.
#[derive(Clone, Debug, Default)]
pub struct AddressIndex {
    records: BTreeMap<IpAddr, AddressRecord>,
}

// What a pointwise neighbor lookup is expected to find.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NeighborExpectation {
    Dynamic,
    Static,
    Absent,
}

// Outcome tally of one reachability probe round.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Serialize)]
pub struct ProbeStats {
    pub answered: usize,
    pub silent: usize,
    pub failed: usize,
}

// Reads neighbor state back from the DUT, pointwise or at scale.
#[derive(new)]
pub struct ConcurrentVerifier {
    store: Arc<dyn DeviceStore>,
    ping: Arc<dyn PingClient>,
    profile: Profile,
}

enum ProbeResult {
    Answered,
    Silent,
    Failed,
}

// ===== impl AddressIndex =====

impl AddressIndex {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, addr: &IpAddr) -> Option<&AddressRecord> {
        self.records.get(addr)
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&IpAddr, &AddressRecord)> + '_ {
        self.records.iter()
    }
}

// ===== impl NeighborExpectation =====

impl NeighborExpectation {
    // Whether the given lookup result satisfies this expectation. IPv6
    // entries additionally carry a reachability state and a router flag;
    // IPv4 entries have neither.
    pub fn matches(&self, entry: Option<&NeighborEntry>) -> bool {
        match self {
            NeighborExpectation::Absent => entry.is_none(),
            NeighborExpectation::Dynamic => entry.is_some_and(|entry| {
                entry.origin == NeighborOrigin::Dynamic
                    && entry.link_layer.is_some()
                    && match entry.ip {
                        IpAddr::V4(_) => true,
                        IpAddr::V6(_) => {
                            entry.is_router
                                && matches!(
                                    entry.state,
                                    Some(ReachabilityState::Reachable)
                                        | Some(ReachabilityState::Delay)
                                )
                        }
                    }
            }),
            NeighborExpectation::Static => entry.is_some_and(|entry| {
                entry.origin == NeighborOrigin::Static
                    && entry.link_layer.is_some()
                    && match entry.ip {
                        IpAddr::V4(_) => true,
                        IpAddr::V6(_) => {
                            entry.state == Some(ReachabilityState::Reachable)
                        }
                    }
            }),
        }
    }
}

// ===== impl ConcurrentVerifier =====

impl ConcurrentVerifier {
    // Probes the dynamic and static neighbor derivation of every
    // assignment, both address families, capped at PROBE_CONCURRENCY
    // in-flight probes.
    //
    // Probe errors and silent destinations are tallied and logged, never
    // fatal: the DUT may still be converging when the round runs.
    pub async fn probe_neighbors(
        &self,
        provisioned: &Provisioned,
    ) -> ProbeStats {
        let mut tasks = TaskGroup::bounded(PROBE_CONCURRENCY);
        for assignment in &provisioned.assignments {
            for (_, base) in assignment.base.iter() {
                for target in
                    [base.dynamic_neighbor(), base.static_neighbor()]
                {
                    let ping = self.ping.clone();
                    tasks.spawn(async move {
                        match ping.ping(target, PROBE_COUNT).await {
                            Ok(mut replies) => {
                                let mut count = 0;
                                while replies.recv().await.is_some() {
                                    count += 1;
                                }
                                if count == 0 {
                                    Debug::ProbeSilent(&target).log();
                                    ProbeResult::Silent
                                } else {
                                    ProbeResult::Answered
                                }
                            }
                            Err(error) => {
                                Error::Probe(error).log();
                                ProbeResult::Failed
                            }
                        }
                    });
                }
            }
        }

        let mut stats = ProbeStats::default();
        for result in tasks.join_all().await {
            match result {
                ProbeResult::Answered => stats.answered += 1,
                ProbeResult::Silent => stats.silent += 1,
                ProbeResult::Failed => stats.failed += 1,
            }
        }
        Debug::ProbeRound(&stats).log();
        stats
    }

    // Issues one bulk collection over the profile's window and builds
    // the address index from the returned rows.
    pub async fn collect_index(&self) -> Result<AddressIndex, Error> {
        let rows = self.store.collect(self.profile.collect_window).await?;

        let mut records = BTreeMap::new();
        for row in rows {
            let nd = match row.af {
                AddressFamily::Ipv4 => NdState::ProxyArp {
                    mode: row.proxy_arp,
                },
                AddressFamily::Ipv6 => NdState::RouterAdvert {
                    ra: row.router_advert,
                    prefixes: row.prefixes.clone(),
                    dad: row.dad,
                },
            };
            let neighbors = row
                .neighbors
                .iter()
                .map(|entry| (entry.ip, entry.clone()))
                .collect::<BTreeMap<_, _>>();
            for address in &row.addresses {
                records.insert(
                    address.ip(),
                    AddressRecord {
                        at: row.at.clone(),
                        prefix: *address,
                        addresses: row.addresses.clone(),
                        neighbors: neighbors.clone(),
                        nd: nd.clone(),
                    },
                );
            }
        }

        let index = AddressIndex { records };
        Debug::IndexBuilt(index.len()).log();
        Ok(index)
    }

    // Pointwise verification: reads one neighbor leaf and compares it to
    // the expectation.
    pub async fn neighbor_matches(
        &self,
        at: &SubifPath,
        ip: IpAddr,
        expect: NeighborExpectation,
    ) -> Result<bool, Error> {
        let entry = self.store.neighbor(at, ip).await?;
        Ok(expect.matches(entry.as_ref()))
    }
}

// ===== tests =====

#[cfg(test)]
mod test_verifier {
    use chrono::Utc;
    use const_addrs::ip;
    use nscale_utils::mac_addr::MacAddr;

    use super::*;

    fn entry(
        ip: IpAddr,
        origin: NeighborOrigin,
        state: Option<ReachabilityState>,
    ) -> NeighborEntry {
        NeighborEntry::new(
            ip,
            Some(MacAddr::from_ip(&ip)),
            origin,
            ip.is_ipv6(),
            state,
            Utc::now(),
        )
    }

    #[test]
    fn expectation_matching() {
        let v4 = ip!("10.10.1.2");
        let v6 = ip!("2001:db8:a01:1::2");

        assert!(NeighborExpectation::Absent.matches(None));
        assert!(!NeighborExpectation::Dynamic.matches(None));

        let dynamic_v4 = entry(v4, NeighborOrigin::Dynamic, None);
        assert!(NeighborExpectation::Dynamic.matches(Some(&dynamic_v4)));
        assert!(!NeighborExpectation::Static.matches(Some(&dynamic_v4)));

        let dynamic_v6 = entry(
            v6,
            NeighborOrigin::Dynamic,
            Some(ReachabilityState::Delay),
        );
        assert!(NeighborExpectation::Dynamic.matches(Some(&dynamic_v6)));

        // A stale IPv6 entry has not converged.
        let stale = entry(
            v6,
            NeighborOrigin::Dynamic,
            Some(ReachabilityState::Stale),
        );
        assert!(!NeighborExpectation::Dynamic.matches(Some(&stale)));

        // Static entries must be exactly reachable.
        let static_v6 = entry(
            v6,
            NeighborOrigin::Static,
            Some(ReachabilityState::Reachable),
        );
        assert!(NeighborExpectation::Static.matches(Some(&static_v6)));
        let static_delay =
            entry(v6, NeighborOrigin::Static, Some(ReachabilityState::Delay));
        assert!(!NeighborExpectation::Static.matches(Some(&static_delay)));
    }
}
