//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::Ipv6Network;
use nscale_utils::addr::{
    AddressFamilies, IpAddrExt, Ipv6AddrExt, SUBNET_UNIT_FIRST,
};

use crate::consts::{BASE_HOST_UNIT, SELECTOR_BASE, V4_NET, V6_NET, V6_PLEN};

// Address layer of a line-card group. Each layer sweeps its own subnet
// range, so addresses from different layers never collide.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Layer {
    Physical,
    PhysicalSub,
    Bundle,
    BundleSub,
}

// Allocation cursor for one (group, layer) pair. Both address families
// advance in lockstep.
#[derive(Clone, Debug)]
pub struct LayerPlan {
    next: AddressFamilies<IpAddr>,
}

// Allocation cursors for all four layers of one line-card group.
#[derive(Clone, Debug)]
pub struct GroupPlan {
    physical: LayerPlan,
    physical_sub: LayerPlan,
    bundle: LayerPlan,
    bundle_sub: LayerPlan,
}

// ===== impl Layer =====

impl Layer {
    pub const ALL: [Layer; 4] =
        [Layer::Physical, Layer::PhysicalSub, Layer::Bundle, Layer::BundleSub];

    pub(crate) fn index(&self) -> u8 {
        match self {
            Layer::Physical => 0,
            Layer::PhysicalSub => 1,
            Layer::Bundle => 2,
            Layer::BundleSub => 3,
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::Physical => write!(f, "physical"),
            Layer::PhysicalSub => write!(f, "physical-sub"),
            Layer::Bundle => write!(f, "bundle"),
            Layer::BundleSub => write!(f, "bundle-sub"),
        }
    }
}

// ===== impl LayerPlan =====

impl LayerPlan {
    fn new(group: usize, layer: Layer) -> LayerPlan {
        let selector = SELECTOR_BASE + 4 * group as u8 + layer.index();
        LayerPlan {
            next: AddressFamilies {
                ipv4: IpAddr::V4(v4_base(selector)),
                ipv6: IpAddr::V6(v6_base(selector)),
            },
        }
    }

    // Returns the next base address pair of the sweep and advances the
    // cursor.
    pub fn allocate(&mut self) -> AddressFamilies<IpAddr> {
        let base = self.next.clone();
        self.next = AddressFamilies {
            ipv4: base.ipv4.next_subnet(),
            ipv6: base.ipv6.next_subnet(),
        };
        base
    }
}

// ===== impl GroupPlan =====

impl GroupPlan {
    pub fn new(group: usize) -> GroupPlan {
        GroupPlan {
            physical: LayerPlan::new(group, Layer::Physical),
            physical_sub: LayerPlan::new(group, Layer::PhysicalSub),
            bundle: LayerPlan::new(group, Layer::Bundle),
            bundle_sub: LayerPlan::new(group, Layer::BundleSub),
        }
    }

    pub fn layer_mut(&mut self, layer: Layer) -> &mut LayerPlan {
        match layer {
            Layer::Physical => &mut self.physical,
            Layer::PhysicalSub => &mut self.physical_sub,
            Layer::Bundle => &mut self.bundle,
            Layer::BundleSub => &mut self.bundle_sub,
        }
    }
}

// ===== global functions =====

// The /64 network advertised for an allocated IPv6 base address.
pub(crate) fn advertised_prefix(addr: &Ipv6Addr) -> Ipv6Network {
    let prefix = addr.to_prefix(V6_PLEN);
    Ipv6Network::new(prefix.network(), V6_PLEN).unwrap()
}

// ===== helper functions =====

// The selector lands in the carry octet of the sweep (second IPv4 octet,
// fifth IPv6 byte), so every (group, layer) pair owns a disjoint range.
fn v4_base(selector: u8) -> Ipv4Addr {
    Ipv4Addr::new(V4_NET, selector, SUBNET_UNIT_FIRST, BASE_HOST_UNIT)
}

fn v6_base(selector: u8) -> Ipv6Addr {
    let mut octets = [0; 16];
    octets[..4].copy_from_slice(&V6_NET);
    octets[4] = selector;
    octets[5] = SUBNET_UNIT_FIRST;
    octets[7] = 0x01;
    octets[15] = BASE_HOST_UNIT;
    Ipv6Addr::from(octets)
}

// ===== tests =====
