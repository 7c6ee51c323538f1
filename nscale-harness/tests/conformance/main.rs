//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

mod provisioning;
mod triggers;

use std::sync::{Arc, Once};

use nscale_dut::store::DeviceStore;
use nscale_dut::stub::StubDevice;
use nscale_dut::topology::{Dut, Testbed};
use nscale_harness::builder::{Provisioned, ScaleConfigBuilder};
use nscale_harness::classifier::{LineCardGroup, classify};
use nscale_harness::profile::Profile;
use nscale_harness::triggers::Triggers;
use nscale_harness::verifier::ConcurrentVerifier;
use tracing::info;

static INIT: Once = Once::new();

const DUT_ID: &str = "dut1";

// One scale run against a stub DUT: the reserved testbed ports, the
// classified line-card groups and the result of one provisioning pass.
pub struct Scenario {
    pub device: Arc<StubDevice>,
    pub profile: Profile,
    pub testbed: Testbed,
    pub groups: Vec<LineCardGroup>,
    pub provisioned: Provisioned,
    pub builder: ScaleConfigBuilder,
    pub verifier: ConcurrentVerifier,
    pub triggers: Triggers,
}

// ===== impl Scenario =====

impl Scenario {
    // Seeds a stub device with the testbed's reserved ports, classifies
    // the reported interfaces and provisions the scale configuration.
    pub async fn provisioned(profile: Profile) -> Scenario {
        setup();

        let testbed = testbed(&profile);
        let device = {
            let dut = testbed.dut(DUT_ID).unwrap();
            Arc::new(StubDevice::with_interfaces(dut.ports()))
        };

        let names = device.interface_names().await.unwrap();
        let groups = classify(&names, &profile).unwrap();
        let builder =
            ScaleConfigBuilder::new(device.clone(), profile.clone());
        let provisioned = builder.provision(&groups).await.unwrap();
        let verifier = ConcurrentVerifier::new(
            device.clone(),
            device.clone(),
            profile.clone(),
        );
        let triggers = Triggers::new(device.clone(), device.clone());

        Scenario {
            device,
            profile,
            testbed,
            groups,
            provisioned,
            builder,
            verifier,
            triggers,
        }
    }
}

// ===== helper functions =====

// A reduced run shape that keeps trigger scenarios readable: two cards
// of three ports each, one bundle, two tagged sub-interfaces per port.
pub fn small_profile() -> Profile {
    Profile {
        ports_per_card: 3,
        physical_ports: 2,
        bundle_count: 1,
        subifs_per_port: 2,
        ..Default::default()
    }
}

// Physical port names of one seeded line card.
pub fn card_ports(profile: &Profile, slot: u8) -> Vec<String> {
    (0..profile.ports_per_card)
        .map(|port| format!("FourHundredGigE0/{}/0/{}", slot, port))
        .collect()
}

// Registers the ports of two line cards on one DUT under logical names.
fn testbed(profile: &Profile) -> Testbed {
    let mut dut = Dut::new(DUT_ID);
    let mut logical = 1;
    for slot in 0..2 {
        for port in card_ports(profile, slot) {
            dut = dut.with_port(&format!("port{}", logical), &port);
            logical += 1;
        }
    }
    let mut testbed = Testbed::new();
    testbed.insert(dut);
    testbed
}

// Common initialization required by all tests.
pub fn setup() {
    INIT.call_once(init_tracing);
}

// Initializes tracing subscriber.
fn init_tracing() {
    tracing_subscriber::fmt::Subscriber::builder()
        .with_target(false)
        .with_ansi(false)
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("starting");
}
