//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv6Addr};

use ipnetwork::Ipv6Network;
use nscale_dut::config::{DadConfig, PrefixConfig, ProxyArpMode, RaConfig};
use nscale_dut::path::SubifPath;
use nscale_dut::telemetry::{
    NeighborEntry, NeighborOrigin, ReachabilityState,
};
use nscale_utils::addr::IpAddrExt;
use nscale_utils::mac_addr::MacAddr;
use serde::Serialize;

use crate::alloc::advertised_prefix;
use crate::consts::{
    DAD_INITIAL, DAD_UPDATED, PREFIX_AUTOCONFIG_INITIAL,
    PREFIX_AUTOCONFIG_UPDATED, PREFIX_ON_LINK_INITIAL, PREFIX_ON_LINK_UPDATED,
    PREFIX_PREFERRED_INITIAL, PREFIX_PREFERRED_UPDATED, PREFIX_VALID_INITIAL,
    PREFIX_VALID_UPDATED, PROXY_ARP_MODE, RA_INITIAL, RA_UPDATED,
};
use crate::debug::Debug;
use crate::verifier::{AddressIndex, AddressRecord};

// Most recent mutation applied to a configuration subject. Telemetry
// cannot distinguish "still default" from "explicitly reset to default",
// so the caller threads the phase through each step instead of guessing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PhaseState {
    #[default]
    Default,
    Updated,
    Deleted,
    StaticAdded,
}

// Phase of every mutable subject, passed into a validation pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VerifyPhases {
    pub ra: PhaseState,
    pub prefix: PhaseState,
    pub dad: PhaseState,
    pub static_neighbor: PhaseState,
}

// One expectation the collected state failed to meet.
#[derive(Clone, Debug)]
#[derive(Serialize)]
pub enum Violation {
    Cardinality {
        found: usize,
        minimum: usize,
    },
    MissingNeighbor {
        neighbor: IpAddr,
        expected: NeighborOrigin,
    },
    LinkLayerMissing {
        neighbor: IpAddr,
    },
    WrongLinkLayer {
        neighbor: IpAddr,
        found: MacAddr,
        expected: MacAddr,
    },
    WrongOrigin {
        neighbor: IpAddr,
        found: NeighborOrigin,
        expected: NeighborOrigin,
    },
    NotRouter {
        neighbor: IpAddr,
    },
    BadReachability {
        neighbor: IpAddr,
        found: Option<ReachabilityState>,
    },
    UnexpectedStatic {
        neighbor: IpAddr,
    },
    ProxyArpMismatch {
        at: SubifPath,
        found: Option<ProxyArpMode>,
        expected: ProxyArpMode,
    },
    RaMismatch {
        at: SubifPath,
        found: Option<RaConfig>,
        expected: RaConfig,
    },
    PrefixMissing {
        at: SubifPath,
        prefix: Ipv6Network,
    },
    PrefixPresent {
        at: SubifPath,
        prefix: Ipv6Network,
    },
    PrefixMismatch {
        at: SubifPath,
        found: PrefixConfig,
        expected: PrefixConfig,
    },
    DadMismatch {
        at: SubifPath,
        found: Option<DadConfig>,
        expected: DadConfig,
    },
}

// Accumulated violations of one validation pass. A pass never aborts on
// the first mismatch; one run reports every violation it found.
#[derive(Clone, Debug, Default)]
#[derive(Serialize)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

// ===== impl Violation =====

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Cardinality { .. } => {
                write!(f, "address index below the expected scale count")
            }
            Violation::MissingNeighbor { .. } => {
                write!(f, "expected neighbor entry is missing")
            }
            Violation::LinkLayerMissing { .. } => {
                write!(f, "neighbor entry has no link-layer address")
            }
            Violation::WrongLinkLayer { .. } => {
                write!(f, "neighbor entry has the wrong link-layer address")
            }
            Violation::WrongOrigin { .. } => {
                write!(f, "neighbor entry has the wrong origin")
            }
            Violation::NotRouter { .. } => {
                write!(f, "IPv6 neighbor is not a router")
            }
            Violation::BadReachability { .. } => {
                write!(f, "neighbor reachability state out of range")
            }
            Violation::UnexpectedStatic { .. } => {
                write!(f, "static neighbor entry survived its deletion")
            }
            Violation::ProxyArpMismatch { .. } => {
                write!(f, "proxy-ARP mode differs from the active config")
            }
            Violation::RaMismatch { .. } => {
                write!(
                    f,
                    "router-advertisement settings differ from the active \
                     config"
                )
            }
            Violation::PrefixMissing { .. } => {
                write!(f, "advertised prefix entry is missing")
            }
            Violation::PrefixPresent { .. } => {
                write!(f, "advertised prefix entry survived its deletion")
            }
            Violation::PrefixMismatch { .. } => {
                write!(
                    f,
                    "advertised prefix settings differ from the active \
                     config"
                )
            }
            Violation::DadMismatch { .. } => {
                write!(f, "DAD settings differ from the active config")
            }
        }
    }
}

// ===== impl ValidationReport =====

impl ValidationReport {
    pub fn record(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

// ===== global functions =====

// Checks the collected address index against the expected per-address
// invariants: index cardinality, both neighbor derivations of every
// address, and the neighbor-discovery settings of the owning row.
pub fn validate(
    index: &AddressIndex,
    phases: &VerifyPhases,
    minimum: usize,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if index.len() < minimum {
        report.record(Violation::Cardinality {
            found: index.len(),
            minimum,
        });
    }

    for (address, record) in index.iter() {
        check_neighbors(&mut report, address, record, phases);
        check_nd(&mut report, record, phases);
    }

    Debug::ValidationOutcome(&report).log();
    report
}

// ===== helper functions =====

// Every address must see its dynamic derivation learned and, unless the
// static subject was deleted, its static derivation configured.
fn check_neighbors(
    report: &mut ValidationReport,
    address: &IpAddr,
    record: &AddressRecord,
    phases: &VerifyPhases,
) {
    let dynamic = address.dynamic_neighbor();
    check_entry(
        report,
        record.neighbors.get(&dynamic),
        dynamic,
        NeighborOrigin::Dynamic,
    );

    let neighbor = address.static_neighbor();
    if phases.static_neighbor == PhaseState::Deleted {
        if record.neighbors.contains_key(&neighbor) {
            report.record(Violation::UnexpectedStatic { neighbor });
        }
    } else {
        check_entry(
            report,
            record.neighbors.get(&neighbor),
            neighbor,
            NeighborOrigin::Static,
        );
    }
}

fn check_entry(
    report: &mut ValidationReport,
    entry: Option<&NeighborEntry>,
    neighbor: IpAddr,
    expected: NeighborOrigin,
) {
    let Some(entry) = entry else {
        report.record(Violation::MissingNeighbor { neighbor, expected });
        return;
    };

    // The derived neighbor owns a fixed link-layer address; any other
    // owner answering for it is a failure.
    let owner = MacAddr::from_ip(&neighbor);
    match entry.link_layer {
        None => report.record(Violation::LinkLayerMissing { neighbor }),
        // Unresolved entries surface as the all-zeroes address.
        Some(found) if found.is_unspecified() => {
            report.record(Violation::LinkLayerMissing { neighbor });
        }
        Some(found) if found != owner => {
            report.record(Violation::WrongLinkLayer {
                neighbor,
                found,
                expected: owner,
            });
        }
        Some(_) => (),
    }

    if entry.origin != expected {
        report.record(Violation::WrongOrigin {
            neighbor,
            found: entry.origin,
            expected,
        });
    }

    if neighbor.is_ipv6() {
        if !entry.is_router {
            report.record(Violation::NotRouter { neighbor });
        }
        let allowed = match expected {
            NeighborOrigin::Static => {
                entry.state == Some(ReachabilityState::Reachable)
            }
            _ => matches!(
                entry.state,
                Some(ReachabilityState::Reachable)
                    | Some(ReachabilityState::Delay)
            ),
        };
        if !allowed {
            report.record(Violation::BadReachability {
                neighbor,
                found: entry.state,
            });
        }
    }
}

fn check_nd(
    report: &mut ValidationReport,
    record: &AddressRecord,
    phases: &VerifyPhases,
) {
    match record.prefix.ip() {
        IpAddr::V4(_) => {
            let found = record.nd.as_proxy_arp().copied().flatten();
            if found != Some(PROXY_ARP_MODE) {
                report.record(Violation::ProxyArpMismatch {
                    at: record.at.clone(),
                    found,
                    expected: PROXY_ARP_MODE,
                });
            }
        }
        IpAddr::V6(addr) => {
            let Some((ra, prefixes, dad)) = record.nd.as_router_advert()
            else {
                return;
            };
            check_ra(report, record, *ra, phases.ra);
            check_prefix(report, record, &addr, prefixes, phases.prefix);
            check_dad(report, record, *dad, phases.dad);
        }
    }
}

fn check_ra(
    report: &mut ValidationReport,
    record: &AddressRecord,
    found: Option<RaConfig>,
    phase: PhaseState,
) {
    let expected = match phase {
        PhaseState::Updated => RA_UPDATED,
        PhaseState::Deleted => RaConfig::DEVICE_DEFAULT,
        _ => RA_INITIAL,
    };
    if found != Some(expected) {
        report.record(Violation::RaMismatch {
            at: record.at.clone(),
            found,
            expected,
        });
    }
}

fn check_prefix(
    report: &mut ValidationReport,
    record: &AddressRecord,
    addr: &Ipv6Addr,
    prefixes: &[PrefixConfig],
    phase: PhaseState,
) {
    let subject = advertised_prefix(addr);
    let found = prefixes.iter().find(|config| config.prefix == subject);

    // A deleted prefix entry simply disappears from telemetry.
    if phase == PhaseState::Deleted {
        if found.is_some() {
            report.record(Violation::PrefixPresent {
                at: record.at.clone(),
                prefix: subject,
            });
        }
        return;
    }

    let expected = expected_prefix(subject, phase);
    match found {
        None => report.record(Violation::PrefixMissing {
            at: record.at.clone(),
            prefix: subject,
        }),
        Some(found) if *found != expected => {
            report.record(Violation::PrefixMismatch {
                at: record.at.clone(),
                found: *found,
                expected,
            });
        }
        Some(_) => (),
    }
}

fn expected_prefix(subject: Ipv6Network, phase: PhaseState) -> PrefixConfig {
    match phase {
        PhaseState::Updated => PrefixConfig::new(
            subject,
            PREFIX_PREFERRED_UPDATED,
            PREFIX_VALID_UPDATED,
            PREFIX_ON_LINK_UPDATED,
            PREFIX_AUTOCONFIG_UPDATED,
        ),
        _ => PrefixConfig::new(
            subject,
            PREFIX_PREFERRED_INITIAL,
            PREFIX_VALID_INITIAL,
            PREFIX_ON_LINK_INITIAL,
            PREFIX_AUTOCONFIG_INITIAL,
        ),
    }
}

fn check_dad(
    report: &mut ValidationReport,
    record: &AddressRecord,
    found: Option<DadConfig>,
    phase: PhaseState,
) {
    let expected = match phase {
        PhaseState::Updated => DAD_UPDATED,
        PhaseState::Deleted => DadConfig::DEVICE_DEFAULT,
        _ => DAD_INITIAL,
    };
    if found != Some(expected) {
        report.record(Violation::DadMismatch {
            at: record.at.clone(),
            found,
            expected,
        });
    }
}

// ===== tests =====
