//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use nscale_dut::config::{DadConfig, ProxyArpMode, RaConfig};

// Cap on concurrently in-flight reachability probes. The control-plane
// ping service on the DUT handles little load; keep this low.
pub const PROBE_CONCURRENCY: usize = 10;

// Echo requests issued per probe destination.
pub const PROBE_COUNT: u32 = 3;

// Poll cadence for convergence waits.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

// Convergence deadlines, chosen empirically per trigger class.
pub const MEMBER_FLAP_DEADLINE: Duration = Duration::from_secs(5);
pub const PROCESS_RESTART_DEADLINE: Duration = Duration::from_secs(30);
pub const COMPONENT_RELOAD_DEADLINE: Duration = Duration::from_secs(40);
pub const REBOOT_DEADLINE: Duration = Duration::from_secs(40);

// Prefix lengths assigned to every interface address.
pub const V4_PLEN: u8 = 24;
pub const V6_PLEN: u8 = 64;

// First octet of every IPv4 base address.
pub const V4_NET: u8 = 10;

// Leading bytes of every IPv6 base address (2001:db8::/32).
pub const V6_NET: [u8; 4] = [0x20, 0x01, 0x0d, 0xb8];

// First value of the per-(group, layer) subnet selector, written into
// the IPv4 second octet and the IPv6 fifth byte.
pub const SELECTOR_BASE: u8 = 10;

// Host unit every base address ends in. Neighbor derivations add 1 and
// 10 to it, so derived hosts never collide with a base.
pub const BASE_HOST_UNIT: u8 = 1;

// Member ports per bundle, one from each card of the group.
pub const BUNDLE_MEMBER_LIMIT: usize = 2;

// Proxy-ARP mode applied to IPv4 sub-interfaces at provisioning time.
pub const PROXY_ARP_MODE: ProxyArpMode = ProxyArpMode::Remote;

// Router Advertisement parameters applied at provisioning time.
pub const RA_INITIAL: RaConfig = RaConfig {
    interval: Duration::from_secs(5),
    lifetime: Duration::from_secs(1800),
    suppress: false,
    other_config: true,
};

// Router Advertisement parameters pushed by the update trigger.
pub const RA_UPDATED: RaConfig = RaConfig {
    interval: Duration::from_secs(10),
    lifetime: Duration::from_secs(3600),
    suppress: true,
    other_config: false,
};

// Advertised-prefix policy applied at provisioning time.
pub const PREFIX_PREFERRED_INITIAL: Duration = Duration::from_secs(14400);
pub const PREFIX_VALID_INITIAL: Duration = Duration::from_secs(86400);
pub const PREFIX_ON_LINK_INITIAL: bool = true;
pub const PREFIX_AUTOCONFIG_INITIAL: bool = true;

// Advertised-prefix policy pushed by the update trigger.
pub const PREFIX_PREFERRED_UPDATED: Duration = Duration::from_secs(7200);
pub const PREFIX_VALID_UPDATED: Duration = Duration::from_secs(28800);
pub const PREFIX_ON_LINK_UPDATED: bool = true;
pub const PREFIX_AUTOCONFIG_UPDATED: bool = false;

// DAD transmit counts.
pub const DAD_INITIAL: DadConfig = DadConfig { transmits: 3 };
pub const DAD_UPDATED: DadConfig = DadConfig { transmits: 5 };
