//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use nscale_dut::config::{
    Batch, ConfigEntry, NeighborConfig, PrefixConfig,
};
use nscale_dut::path::{ConfigPath, SubifPath};
use nscale_dut::store::{DeviceControl, DeviceStore};
use nscale_dut::telemetry::PortFlags;
use nscale_utils::addr::AddressFamily;
use nscale_utils::mac_addr::MacAddr;
use nscale_utils::task::{TaskGroup, poll_until};

use crate::alloc::advertised_prefix;
use crate::builder::{Assignment, BundleMembers};
use crate::consts::{
    COMPONENT_RELOAD_DEADLINE, DAD_UPDATED, MEMBER_FLAP_DEADLINE,
    POLL_INTERVAL, PREFIX_AUTOCONFIG_UPDATED, PREFIX_ON_LINK_UPDATED,
    PREFIX_PREFERRED_UPDATED, PREFIX_VALID_UPDATED, RA_UPDATED,
    REBOOT_DEADLINE,
};
use crate::debug::Debug;
use crate::error::Error;
use crate::verifier::NeighborExpectation;

// Mutation triggers applied between verification passes. Configuration
// changes go through the batch store; disruptive operations go through
// the device control plane and are followed by a convergence wait.
#[derive(new)]
pub struct Triggers {
    store: Arc<dyn DeviceStore>,
    control: Arc<dyn DeviceControl>,
}

// ===== impl Triggers =====

impl Triggers {
    pub async fn add_static_neighbor(
        &self,
        at: &SubifPath,
        ip: IpAddr,
    ) -> Result<(), Error> {
        Debug::TriggerRun("static-neighbor-add").log();
        let mut batch = Batch::new();
        batch.replace(ConfigEntry::Neighbor {
            at: at.clone(),
            config: NeighborConfig::new(ip, MacAddr::from_ip(&ip)),
        });
        self.store.commit(batch).await?;
        Ok(())
    }

    pub async fn delete_static_neighbor(
        &self,
        at: &SubifPath,
        ip: IpAddr,
    ) -> Result<(), Error> {
        Debug::TriggerRun("static-neighbor-delete").log();
        let mut batch = Batch::new();
        batch.delete(ConfigPath::Neighbor { at: at.clone(), ip });
        self.store.commit(batch).await?;
        Ok(())
    }

    // Clears the learned entries of one address family. Configured
    // static neighbors survive the flush.
    pub async fn flush_neighbor_cache(
        &self,
        at: &SubifPath,
        af: AddressFamily,
    ) -> Result<(), Error> {
        Debug::TriggerRun("neighbor-cache-flush").log();
        let mut batch = Batch::new();
        batch.delete(ConfigPath::NeighborCache { at: at.clone(), af });
        self.store.commit(batch).await?;
        Ok(())
    }

    // Replaces the RA, advertised-prefix and DAD settings of the
    // assignment's IPv6 row with the updated values, in one batch.
    pub async fn update_nd(
        &self,
        assignment: &Assignment,
    ) -> Result<(), Error> {
        Debug::TriggerRun("nd-update").log();
        let at = &assignment.at;
        let mut batch = Batch::new();
        batch.replace(ConfigEntry::RouterAdvertisement {
            at: at.clone(),
            config: RA_UPDATED,
        });
        if let IpAddr::V6(addr) = assignment.base.ipv6 {
            batch.replace(ConfigEntry::Prefix {
                at: at.clone(),
                config: PrefixConfig::new(
                    advertised_prefix(&addr),
                    PREFIX_PREFERRED_UPDATED,
                    PREFIX_VALID_UPDATED,
                    PREFIX_ON_LINK_UPDATED,
                    PREFIX_AUTOCONFIG_UPDATED,
                ),
            });
        }
        batch.replace(ConfigEntry::Dad {
            at: at.clone(),
            config: DAD_UPDATED,
        });
        self.store.commit(batch).await?;
        Ok(())
    }

    // Deletes the RA, advertised-prefix and DAD settings of the
    // assignment's IPv6 row, returning them to device defaults.
    pub async fn delete_nd(
        &self,
        assignment: &Assignment,
    ) -> Result<(), Error> {
        Debug::TriggerRun("nd-delete").log();
        let at = &assignment.at;
        let mut batch = Batch::new();
        batch.delete(ConfigPath::RouterAdvertisement { at: at.clone() });
        if let IpAddr::V6(addr) = assignment.base.ipv6 {
            batch.delete(ConfigPath::Prefix {
                at: at.clone(),
                prefix: advertised_prefix(&addr),
            });
        }
        batch.delete(ConfigPath::Dad { at: at.clone() });
        self.store.commit(batch).await?;
        Ok(())
    }

    // Detaches a member port from its bundle and waits for the member
    // flag to clear.
    pub async fn remove_bundle_member(
        &self,
        bundles: &mut BundleMembers,
        bundle: &str,
        port: &str,
    ) -> Result<(), Error> {
        Debug::TriggerRun("bundle-member-remove").log();
        bundles.remove(bundle, port);
        let mut batch = Batch::new();
        batch.delete(ConfigPath::AggregateId {
            ifname: port.to_owned(),
        });
        self.store.commit(batch).await?;
        await_port_flag(
            &self.store,
            port,
            PortFlags::BUNDLE_MEMBER,
            false,
            MEMBER_FLAP_DEADLINE,
        )
        .await
    }

    // Attaches a member port to a bundle and waits for the member flag
    // to appear. Exclusive ownership is enforced before any write.
    pub async fn add_bundle_member(
        &self,
        bundles: &mut BundleMembers,
        bundle: &str,
        port: &str,
    ) -> Result<(), Error> {
        Debug::TriggerRun("bundle-member-add").log();
        bundles.add(bundle, port)?;
        let mut batch = Batch::new();
        batch.replace(ConfigEntry::AggregateId {
            ifname: port.to_owned(),
            bundle: bundle.to_owned(),
        });
        self.store.commit(batch).await?;
        await_port_flag(
            &self.store,
            port,
            PortFlags::BUNDLE_MEMBER,
            true,
            MEMBER_FLAP_DEADLINE,
        )
        .await
    }

    // Reloads one line-card component and waits for its ports to come
    // back up.
    pub async fn reload_component(
        &self,
        component: &str,
        ports: &[String],
    ) -> Result<(), Error> {
        Debug::TriggerRun("component-reload").log();
        self.control.reload_component(component).await?;
        self.await_ports_up(ports, COMPONENT_RELOAD_DEADLINE).await
    }

    // Restarts the given neighbor-resolution process. Re-learning is the
    // caller's business: probe again and await the entries.
    pub async fn restart_process(&self, process: &str) -> Result<(), Error> {
        Debug::TriggerRun("process-restart").log();
        self.control.restart_process(process).await?;
        Ok(())
    }

    // Reboots the device and waits for the given ports to come back up.
    pub async fn reboot(&self, ports: &[String]) -> Result<(), Error> {
        Debug::TriggerRun("reboot").log();
        self.control.reboot().await?;
        self.await_ports_up(ports, REBOOT_DEADLINE).await
    }

    // Polls one neighbor leaf until it satisfies the expectation or the
    // deadline passes.
    pub async fn await_neighbor(
        &self,
        at: &SubifPath,
        ip: IpAddr,
        expect: NeighborExpectation,
        deadline: Duration,
    ) -> Result<(), Error> {
        poll_until(deadline, POLL_INTERVAL, || {
            let store = self.store.clone();
            let at = at.clone();
            async move {
                match store.neighbor(&at, ip).await {
                    Ok(entry) if expect.matches(entry.as_ref()) => Some(()),
                    _ => None,
                }
            }
        })
        .await
        .map_err(|_| Error::Convergence {
            what: format!("neighbor {} on {}", ip, at),
            deadline,
        })
    }

    // Waits for every given port to report operational, one task per
    // port.
    async fn await_ports_up(
        &self,
        ports: &[String],
        deadline: Duration,
    ) -> Result<(), Error> {
        let mut tasks = TaskGroup::<Result<(), Error>>::new();
        for port in ports {
            let store = self.store.clone();
            let port = port.clone();
            tasks.spawn(async move {
                await_port_flag(
                    &store,
                    &port,
                    PortFlags::OPERATIVE,
                    true,
                    deadline,
                )
                .await
            });
        }
        for result in tasks.join_all().await {
            result?;
        }
        Ok(())
    }
}

// ===== helper functions =====

async fn await_port_flag(
    store: &Arc<dyn DeviceStore>,
    port: &str,
    flag: PortFlags,
    present: bool,
    deadline: Duration,
) -> Result<(), Error> {
    poll_until(deadline, POLL_INTERVAL, || {
        let store = store.clone();
        let port = port.to_owned();
        async move {
            match store.port_flags(&port).await {
                Ok(flags) if flags.contains(flag) == present => Some(()),
                _ => None,
            }
        }
    })
    .await
    .map_err(|_| Error::Convergence {
        what: format!("port {} flags", port),
        deadline,
    })
}

// ===== tests =====
