//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use derive_new::new;
use ipnetwork::IpNetwork;
use nscale_dut::config::{
    AddressConfig, Batch, ConfigEntry, NeighborConfig, PrefixConfig,
    SubinterfaceConfig,
};
use nscale_dut::path::SubifPath;
use nscale_dut::store::DeviceStore;
use nscale_utils::addr::{
    AddressFamilies, AddressFamily, IpAddrExt, Ipv4AddrExt, Ipv6AddrExt,
};
use nscale_utils::mac_addr::MacAddr;
use nscale_utils::task::TaskGroup;

use crate::alloc::{GroupPlan, Layer, advertised_prefix};
use crate::classifier::LineCardGroup;
use crate::consts::{
    BUNDLE_MEMBER_LIMIT, DAD_INITIAL, PREFIX_AUTOCONFIG_INITIAL,
    PREFIX_ON_LINK_INITIAL, PREFIX_PREFERRED_INITIAL, PREFIX_VALID_INITIAL,
    PROXY_ARP_MODE, RA_INITIAL, V4_PLEN, V6_PLEN,
};
use crate::debug::Debug;
use crate::error::Error;
use crate::profile::Profile;

// Bundle membership map. A member port belongs to at most one bundle at
// a time, and a bundle carries at most BUNDLE_MEMBER_LIMIT ports.
#[derive(Clone, Debug, Default)]
pub struct BundleMembers {
    members: BTreeMap<String, Vec<String>>,
    owners: BTreeMap<String, String>,
}

// One provisioned sub-interface and the base address pair allocated to
// it.
#[derive(Clone, Debug)]
#[derive(new)]
pub struct Assignment {
    pub group: usize,
    pub layer: Layer,
    pub at: SubifPath,
    pub vlan: Option<u16>,
    pub base: AddressFamilies<IpAddr>,
}

// Everything one provisioning pass pushed to the DUT, handed back to the
// caller for verification and trigger targeting.
#[derive(Clone, Debug)]
pub struct Provisioned {
    pub assignments: Vec<Assignment>,
    pub bundles: BundleMembers,
}

// Builds the scale configuration and commits it in batches.
#[derive(new)]
pub struct ScaleConfigBuilder {
    store: Arc<dyn DeviceStore>,
    profile: Profile,
}

// Deterministic output of the planning pass.
struct ProvisionPlan {
    assignments: Vec<Assignment>,
    bundles: BundleMembers,
    // (group, member port, bundle)
    attachments: Vec<(usize, String, String)>,
}

// ===== impl BundleMembers =====

impl BundleMembers {
    // Adds a member port to a bundle.
    pub fn add(&mut self, bundle: &str, port: &str) -> Result<(), Error> {
        if let Some(owner) = self.owners.get(port) {
            return Err(Error::BundleOwnership {
                port: port.to_owned(),
                owner: owner.clone(),
            });
        }
        let members = self.members.entry(bundle.to_owned()).or_default();
        if members.len() >= BUNDLE_MEMBER_LIMIT {
            return Err(Error::BundleCapacity {
                bundle: bundle.to_owned(),
            });
        }
        members.push(port.to_owned());
        self.owners.insert(port.to_owned(), bundle.to_owned());
        Ok(())
    }

    // Removes a member port from a bundle, returning whether it was a
    // member.
    pub fn remove(&mut self, bundle: &str, port: &str) -> bool {
        let Some(members) = self.members.get_mut(bundle) else {
            return false;
        };
        let Some(position) =
            members.iter().position(|member| member == port)
        else {
            return false;
        };
        members.remove(position);
        self.owners.remove(port);
        true
    }

    pub fn members(&self, bundle: &str) -> &[String] {
        self.members
            .get(bundle)
            .map(|members| members.as_slice())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.members
            .iter()
            .map(|(bundle, members)| (bundle.as_str(), members.as_slice()))
    }
}

// ===== impl Provisioned =====

impl Provisioned {
    // Minimum cardinality of the scale-wide address index: one IPv4 and
    // one IPv6 address per assignment.
    pub fn expected_index_len(&self) -> usize {
        self.assignments.len() * 2
    }
}

// ===== impl ScaleConfigBuilder =====

impl ScaleConfigBuilder {
    // Provisions all four address layers of every line-card group.
    //
    // Planning is sequential and deterministic. The planned batches are
    // then committed concurrently, one task per (group, layer, address
    // family), and any commit error fails the pass.
    pub async fn provision(
        &self,
        groups: &[LineCardGroup],
    ) -> Result<Provisioned, Error> {
        let plan = self.plan(groups)?;

        let mut tasks = TaskGroup::<Result<(), Error>>::new();
        for group in 0..groups.len() {
            for layer in Layer::ALL {
                let subset = plan
                    .assignments
                    .iter()
                    .filter(|assignment| {
                        assignment.group == group && assignment.layer == layer
                    })
                    .cloned()
                    .collect::<Vec<_>>();
                if subset.is_empty() {
                    continue;
                }
                for af in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
                    // Member attachments ride in the IPv4 bundle batch.
                    let attachments = if layer == Layer::Bundle
                        && af == AddressFamily::Ipv4
                    {
                        plan.attachments_of(group)
                    } else {
                        Vec::new()
                    };
                    let store = self.store.clone();
                    let subset = subset.clone();
                    tasks.spawn(async move {
                        let batch = compose_batch(&subset, &attachments, af);
                        let ops = batch.len();
                        store.commit(batch).await?;
                        Debug::BatchCommitted(layer, af, ops).log();
                        Ok(())
                    });
                }
            }
        }
        for result in tasks.join_all().await {
            result?;
        }

        Ok(Provisioned {
            assignments: plan.assignments,
            bundles: plan.bundles,
        })
    }

    fn plan(&self, groups: &[LineCardGroup]) -> Result<ProvisionPlan, Error> {
        let profile = &self.profile;
        let mut assignments = Vec::new();
        let mut bundles = BundleMembers::default();
        let mut attachments = Vec::new();

        for (group, cards) in groups.iter().enumerate() {
            let required = profile.ports_required();
            for side in [&cards.first, &cards.second] {
                if side.len() < required {
                    return Err(Error::InsufficientPorts {
                        found: side.len(),
                        required,
                    });
                }
            }
            let mut plan = GroupPlan::new(group);
            let sides = [&cards.first, &cards.second];

            // Physical untagged addresses, one per port.
            for side in sides {
                for port in &side[..profile.physical_ports] {
                    assignments.push(Assignment::new(
                        group,
                        Layer::Physical,
                        SubifPath::new(port.clone(), 0),
                        None,
                        plan.layer_mut(Layer::Physical).allocate(),
                    ));
                }
            }

            // VLAN-tagged sub-interfaces of the physical ports.
            for side in sides {
                for port in &side[..profile.physical_ports] {
                    for vlan in profile.subif_vlans() {
                        assignments.push(Assignment::new(
                            group,
                            Layer::PhysicalSub,
                            SubifPath::new(port.clone(), vlan as u32),
                            Some(vlan),
                            plan.layer_mut(Layer::PhysicalSub).allocate(),
                        ));
                    }
                }
            }

            // Bundles, each owning one member port from each card.
            for index in 0..profile.bundle_count {
                let bundle = bundle_name(group, index, profile.bundle_count);
                for side in sides {
                    let member = side[profile.physical_ports + index].clone();
                    bundles.add(&bundle, &member)?;
                    attachments.push((group, member, bundle.clone()));
                }
                assignments.push(Assignment::new(
                    group,
                    Layer::Bundle,
                    SubifPath::new(bundle, 0),
                    None,
                    plan.layer_mut(Layer::Bundle).allocate(),
                ));
            }

            // VLAN-tagged sub-interfaces of the bundles.
            for index in 0..profile.bundle_count {
                let bundle = bundle_name(group, index, profile.bundle_count);
                for vlan in profile.subif_vlans() {
                    assignments.push(Assignment::new(
                        group,
                        Layer::BundleSub,
                        SubifPath::new(bundle.clone(), vlan as u32),
                        Some(vlan),
                        plan.layer_mut(Layer::BundleSub).allocate(),
                    ));
                }
            }
        }

        Ok(ProvisionPlan {
            assignments,
            bundles,
            attachments,
        })
    }
}

// ===== impl ProvisionPlan =====

impl ProvisionPlan {
    fn attachments_of(&self, group: usize) -> Vec<(String, String)> {
        self.attachments
            .iter()
            .filter(|(owner, ..)| *owner == group)
            .map(|(_, port, bundle)| (port.clone(), bundle.clone()))
            .collect()
    }
}

// ===== helper functions =====

fn bundle_name(group: usize, index: usize, per_group: usize) -> String {
    format!("Bundle-Ether{}", group * per_group + index + 1)
}

// Coalesces one layer's writes for one address family into a single
// batch: sub-interface, interface address, static neighbor and the
// per-family neighbor-discovery settings.
fn compose_batch(
    assignments: &[Assignment],
    attachments: &[(String, String)],
    af: AddressFamily,
) -> Batch {
    let mut batch = Batch::new();
    for (port, bundle) in attachments {
        batch.replace(ConfigEntry::AggregateId {
            ifname: port.clone(),
            bundle: bundle.clone(),
        });
    }
    for assignment in assignments {
        let at = &assignment.at;
        let base = *assignment.base.get(af);
        batch.replace(ConfigEntry::Subinterface {
            at: at.clone(),
            config: SubinterfaceConfig::new(assignment.vlan, true),
        });
        batch.replace(ConfigEntry::Address {
            at: at.clone(),
            config: AddressConfig::new(address_prefix(base)),
        });
        let neighbor = base.static_neighbor();
        batch.replace(ConfigEntry::Neighbor {
            at: at.clone(),
            config: NeighborConfig::new(neighbor, MacAddr::from_ip(&neighbor)),
        });
        match af {
            AddressFamily::Ipv4 => {
                batch.replace(ConfigEntry::ProxyArp {
                    at: at.clone(),
                    mode: PROXY_ARP_MODE,
                });
            }
            AddressFamily::Ipv6 => {
                batch.replace(ConfigEntry::RouterAdvertisement {
                    at: at.clone(),
                    config: RA_INITIAL,
                });
                if let IpAddr::V6(addr) = base {
                    batch.replace(ConfigEntry::Prefix {
                        at: at.clone(),
                        config: PrefixConfig::new(
                            advertised_prefix(&addr),
                            PREFIX_PREFERRED_INITIAL,
                            PREFIX_VALID_INITIAL,
                            PREFIX_ON_LINK_INITIAL,
                            PREFIX_AUTOCONFIG_INITIAL,
                        ),
                    });
                }
                batch.replace(ConfigEntry::Dad {
                    at: at.clone(),
                    config: DAD_INITIAL,
                });
            }
        }
    }
    batch
}

fn address_prefix(addr: IpAddr) -> IpNetwork {
    match addr {
        IpAddr::V4(addr) => IpNetwork::V4(addr.to_prefix(V4_PLEN)),
        IpAddr::V6(addr) => IpNetwork::V6(addr.to_prefix(V6_PLEN)),
    }
}

// ===== tests =====

#[cfg(test)]
mod test_builder {
    use const_addrs::ip;
    use nscale_dut::stub::StubDevice;

    use super::*;

    fn small_profile() -> Profile {
        Profile {
            physical_ports: 2,
            bundle_count: 1,
            subifs_per_port: 2,
            ..Default::default()
        }
    }

    fn group() -> LineCardGroup {
        let card = |slot: u8| {
            (0..3)
                .map(|port| format!("FourHundredGigE0/{}/0/{}", slot, port))
                .collect::<Vec<_>>()
        };
        LineCardGroup::new(card(0), card(1))
    }

    #[test]
    fn exclusive_bundle_ownership() {
        let mut bundles = BundleMembers::default();
        bundles.add("Bundle-Ether1", "port1").unwrap();
        bundles.add("Bundle-Ether1", "port2").unwrap();

        let error = bundles.add("Bundle-Ether2", "port1").unwrap_err();
        assert!(matches!(error, Error::BundleOwnership { .. }));
        let error = bundles.add("Bundle-Ether1", "port3").unwrap_err();
        assert!(matches!(error, Error::BundleCapacity { .. }));

        assert!(bundles.remove("Bundle-Ether1", "port1"));
        assert!(!bundles.remove("Bundle-Ether1", "port1"));
        bundles.add("Bundle-Ether2", "port1").unwrap();
        assert_eq!(bundles.members("Bundle-Ether2"), ["port1"]);
    }

    #[tokio::test]
    async fn test_provision_plan_shape() {
        let profile = small_profile();
        let cards = group();
        let names = cards
            .first
            .iter()
            .chain(&cards.second)
            .map(String::as_str)
            .collect::<Vec<_>>();
        let store = Arc::new(StubDevice::with_interfaces(names));
        let builder = ScaleConfigBuilder::new(store, profile.clone());

        let provisioned = builder.provision(&[cards.clone()]).await.unwrap();
        assert_eq!(
            provisioned.assignments.len(),
            profile.addresses_per_group()
        );

        // The first physical assignment carries the group's base pair.
        let first = &provisioned.assignments[0];
        assert_eq!(first.layer, Layer::Physical);
        assert_eq!(first.at, SubifPath::new(cards.first[0].clone(), 0));
        assert_eq!(first.base.ipv4, ip!("10.10.1.1"));
        assert_eq!(first.base.ipv6, ip!("2001:db8:a01:1::1"));

        // Both member ports landed in the single bundle.
        assert_eq!(
            provisioned.bundles.members("Bundle-Ether1"),
            [cards.first[2].as_str(), cards.second[2].as_str()]
        );
    }

    #[tokio::test]
    async fn test_provision_rejects_short_group() {
        let profile = small_profile();
        let store = Arc::new(StubDevice::with_interfaces(["HundredGigE0/0/0/0"]));
        let builder = ScaleConfigBuilder::new(store, profile);

        let short = LineCardGroup::new(
            vec!["HundredGigE0/0/0/0".to_owned()],
            vec!["HundredGigE0/1/0/0".to_owned()],
        );
        let error = builder.provision(&[short]).await.unwrap_err();
        assert!(matches!(
            error,
            Error::InsufficientPorts {
                found: 1,
                required: 3
            }
        ));
    }
}
