//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{Ipv4Network, Ipv6Network};
use serde::{Deserialize, Serialize};

// Address Family identifier.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

// Container for storing separate values for IPv4 and IPv6.
#[derive(Clone, Debug, Default)]
#[derive(Deserialize, Serialize)]
pub struct AddressFamilies<T> {
    pub ipv4: T,
    pub ipv6: T,
}

// Subnet sweep bounds.
//
// Allocation advances the subnet octet (the third IPv4 octet, the sixth
// IPv6 byte) through [1, 253]; when the increment would reach 254 the
// octet wraps back to 1 and the carry octet is incremented. Keeping 254
// out of the sweep leaves the top of every range unused, so a carry is
// always observable one step before the octet would overflow.
pub const SUBNET_UNIT_FIRST: u8 = 1;
pub const SUBNET_UNIT_WRAP: u8 = 254;

// Host-unit offsets applied to the last octet/byte of a base address.
//
// Bases always end in host unit 1, so the derived hosts (2 and 11) can
// never collide with a base address or with each other. Disjointness is
// structural; nothing checks it at runtime.
pub const DYNAMIC_NEIGHBOR_OFFSET: u8 = 1;
pub const STATIC_NEIGHBOR_OFFSET: u8 = 10;

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns the address family of this address.
    fn address_family(&self) -> AddressFamily;

    // Returns the next address of the subnet sweep.
    fn next_subnet(&self) -> IpAddr;

    // Returns the derived dynamic-neighbor address.
    fn dynamic_neighbor(&self) -> IpAddr;

    // Returns the derived static-neighbor address.
    fn static_neighbor(&self) -> IpAddr;
}

// Extension methods for Ipv4Addr.
pub trait Ipv4AddrExt {
    // Returns the next address of the subnet sweep: the third octet is
    // incremented, carrying into the second octet at the wrap threshold.
    fn next_subnet(&self) -> Ipv4Addr;

    // Returns the derived dynamic-neighbor address (last octet + 1).
    fn dynamic_neighbor(&self) -> Ipv4Addr;

    // Returns the derived static-neighbor address (last octet + 10).
    fn static_neighbor(&self) -> Ipv4Addr;

    // Converts this IPv4 address into a prefix of the given length.
    fn to_prefix(&self, plen: u8) -> Ipv4Network;
}

// Extension methods for Ipv6Addr.
pub trait Ipv6AddrExt {
    // Returns the next address of the subnet sweep: the sixth byte of
    // the 16-byte form is incremented, carrying into the fifth byte at
    // the wrap threshold.
    fn next_subnet(&self) -> Ipv6Addr;

    // Returns the derived dynamic-neighbor address (last byte + 1).
    fn dynamic_neighbor(&self) -> Ipv6Addr;

    // Returns the derived static-neighbor address (last byte + 10).
    fn static_neighbor(&self) -> Ipv6Addr;

    // Converts this IPv6 address into a prefix of the given length.
    fn to_prefix(&self, plen: u8) -> Ipv6Network;
}

// ===== impl AddressFamily =====

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

// ===== impl AddressFamilies =====

impl<T> AddressFamilies<T> {
    // Returns a reference to the value corresponding to the given address
    // family.
    pub fn get(&self, af: AddressFamily) -> &T {
        match af {
            AddressFamily::Ipv4 => &self.ipv4,
            AddressFamily::Ipv6 => &self.ipv6,
        }
    }

    // Returns a mutable reference to the value corresponding to the given
    // address family.
    pub fn get_mut(&mut self, af: AddressFamily) -> &mut T {
        match af {
            AddressFamily::Ipv4 => &mut self.ipv4,
            AddressFamily::Ipv6 => &mut self.ipv6,
        }
    }

    // Returns an iterator over immutable references to all address family
    // values.
    pub fn iter(&self) -> impl Iterator<Item = (AddressFamily, &T)> {
        [
            (AddressFamily::Ipv4, &self.ipv4),
            (AddressFamily::Ipv6, &self.ipv6),
        ]
        .into_iter()
    }
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn next_subnet(&self) -> IpAddr {
        match self {
            IpAddr::V4(addr) => IpAddr::V4(addr.next_subnet()),
            IpAddr::V6(addr) => IpAddr::V6(addr.next_subnet()),
        }
    }

    fn dynamic_neighbor(&self) -> IpAddr {
        match self {
            IpAddr::V4(addr) => IpAddr::V4(addr.dynamic_neighbor()),
            IpAddr::V6(addr) => IpAddr::V6(addr.dynamic_neighbor()),
        }
    }

    fn static_neighbor(&self) -> IpAddr {
        match self {
            IpAddr::V4(addr) => IpAddr::V4(addr.static_neighbor()),
            IpAddr::V6(addr) => IpAddr::V6(addr.static_neighbor()),
        }
    }
}

// ===== impl Ipv4Addr =====

impl Ipv4AddrExt for Ipv4Addr {
    fn next_subnet(&self) -> Ipv4Addr {
        let mut octets = self.octets();
        if octets[2] >= SUBNET_UNIT_WRAP - 1 {
            octets[1] = octets[1].wrapping_add(1);
            octets[2] = SUBNET_UNIT_FIRST;
        } else {
            octets[2] += 1;
        }
        Ipv4Addr::from(octets)
    }

    fn dynamic_neighbor(&self) -> Ipv4Addr {
        let mut octets = self.octets();
        octets[3] = octets[3].wrapping_add(DYNAMIC_NEIGHBOR_OFFSET);
        Ipv4Addr::from(octets)
    }

    fn static_neighbor(&self) -> Ipv4Addr {
        let mut octets = self.octets();
        octets[3] = octets[3].wrapping_add(STATIC_NEIGHBOR_OFFSET);
        Ipv4Addr::from(octets)
    }

    fn to_prefix(&self, plen: u8) -> Ipv4Network {
        Ipv4Network::new(*self, plen).unwrap()
    }
}

// ===== impl Ipv6Addr =====

impl Ipv6AddrExt for Ipv6Addr {
    fn next_subnet(&self) -> Ipv6Addr {
        let mut octets = self.octets();
        if octets[5] >= SUBNET_UNIT_WRAP - 1 {
            octets[4] = octets[4].wrapping_add(1);
            octets[5] = SUBNET_UNIT_FIRST;
        } else {
            octets[5] += 1;
        }
        Ipv6Addr::from(octets)
    }

    fn dynamic_neighbor(&self) -> Ipv6Addr {
        let mut octets = self.octets();
        octets[15] = octets[15].wrapping_add(DYNAMIC_NEIGHBOR_OFFSET);
        Ipv6Addr::from(octets)
    }

    fn static_neighbor(&self) -> Ipv6Addr {
        let mut octets = self.octets();
        octets[15] = octets[15].wrapping_add(STATIC_NEIGHBOR_OFFSET);
        Ipv6Addr::from(octets)
    }

    fn to_prefix(&self, plen: u8) -> Ipv6Network {
        Ipv6Network::new(*self, plen).unwrap()
    }
}

// ===== unit tests =====
