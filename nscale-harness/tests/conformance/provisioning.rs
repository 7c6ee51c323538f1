//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use const_addrs::ip;
use nscale_dut::error::TopologyError;
use nscale_dut::store::DeviceStore;
use nscale_dut::stub::StubDevice;
use nscale_harness::alloc::Layer;
use nscale_harness::classifier::classify;
use nscale_harness::error::Error;
use nscale_harness::profile::Profile;
use nscale_harness::validator::{VerifyPhases, validate};
use nscale_harness::verifier::ProbeStats;

use crate::{Scenario, card_ports, setup, small_profile};

// Input:
//  * Two full line cards at the default run shape
// Output:
//  * One classified group, ports in reported order
//  * Every assignment's neighbor derivations answer the probe round
//  * The scale-wide index holds one IPv4 and one IPv6 record per
//    assignment and validates clean
#[tokio::test]
async fn scale_provision_and_validate() {
    let scenario = Scenario::provisioned(Profile::default()).await;
    let provisioned = &scenario.provisioned;

    assert_eq!(scenario.groups.len(), 1);
    assert_eq!(scenario.groups[0].first[0], "FourHundredGigE0/0/0/0");
    assert_eq!(
        provisioned.assignments.len(),
        scenario.profile.addresses_per_group()
    );

    // Group 0 layer bases: physical owns selector 10, bundles selector
    // 12.
    let first = &provisioned.assignments[0];
    assert_eq!(first.base.ipv4, ip!("10.10.1.1"));
    assert_eq!(first.base.ipv6, ip!("2001:db8:a01:1::1"));
    let bundle = provisioned
        .assignments
        .iter()
        .find(|assignment| assignment.layer == Layer::Bundle)
        .unwrap();
    assert_eq!(bundle.at.ifname, "Bundle-Ether1");
    assert_eq!(bundle.base.ipv4, ip!("10.12.1.1"));
    assert_eq!(bundle.base.ipv6, ip!("2001:db8:c01:1::1"));

    let stats = scenario.verifier.probe_neighbors(provisioned).await;
    assert_eq!(
        stats,
        ProbeStats {
            answered: 4 * provisioned.assignments.len(),
            silent: 0,
            failed: 0,
        }
    );

    let index = scenario.verifier.collect_index().await.unwrap();
    assert_eq!(index.len(), provisioned.expected_index_len());

    let report = validate(
        &index,
        &VerifyPhases::default(),
        provisioned.expected_index_len(),
    );
    assert!(report.is_clean(), "{:?}", report.violations());
}

// Input:
//  * A second provisioning pass over an already provisioned device
// Output:
//  * Identical assignments, no new index entries, still clean
#[tokio::test]
async fn reprovision_is_idempotent() {
    let scenario = Scenario::provisioned(small_profile()).await;
    scenario.verifier.probe_neighbors(&scenario.provisioned).await;
    let before = scenario.verifier.collect_index().await.unwrap();

    let second = scenario.builder.provision(&scenario.groups).await.unwrap();
    assert_eq!(
        second.assignments.len(),
        scenario.provisioned.assignments.len()
    );
    assert_eq!(
        second.assignments[0].base.ipv4,
        scenario.provisioned.assignments[0].base.ipv4
    );

    let after = scenario.verifier.collect_index().await.unwrap();
    assert_eq!(after.len(), before.len());
    let report =
        validate(&after, &VerifyPhases::default(), second.expected_index_len());
    assert!(report.is_clean(), "{:?}", report.violations());
}

// Input:
//  * A testbed providing fewer matching ports than the run shape needs
// Output:
//  * Classification fails before anything is written to the device
#[tokio::test]
async fn undersized_testbed_fails_before_any_write() {
    setup();
    let profile = small_profile();
    let names = [
        "FourHundredGigE0/0/0/0".to_owned(),
        "FourHundredGigE0/0/0/1".to_owned(),
        "FourHundredGigE0/1/0/0".to_owned(),
        "FourHundredGigE0/1/0/1".to_owned(),
    ];
    let device = StubDevice::with_interfaces(
        names.iter().map(String::as_str),
    );

    let error = classify(&names, &profile).unwrap_err();
    assert!(matches!(
        error,
        Error::InsufficientPorts {
            found: 2,
            required: 3
        }
    ));

    // The device never saw a single batch.
    let rows = device.collect(profile.collect_window).await.unwrap();
    assert!(rows.is_empty());
}

// Input:
//  * Logical port lookups against the scenario testbed
// Output:
//  * Reserved names resolve to classified ports; unreserved names fail
#[tokio::test]
async fn testbed_resolves_reserved_ports() {
    let scenario = Scenario::provisioned(small_profile()).await;
    let dut = scenario.testbed.dut(crate::DUT_ID).unwrap();
    assert_eq!(dut.id(), crate::DUT_ID);

    let physical = dut.port("port1").unwrap();
    assert!(scenario.groups[0].first.iter().any(|name| name == physical));

    let error = dut.port("port99").unwrap_err();
    assert!(matches!(error, TopologyError::UnknownPort { .. }));
    let error = scenario.testbed.dut("dut9").unwrap_err();
    assert!(matches!(error, TopologyError::UnknownDut(_)));
}

// Input:
//  * Cards of eleven ports, where "...10" sorts before "...2"
//    lexicographically
// Output:
//  * Groups keep numeric port order via the length sort
#[tokio::test]
async fn classification_orders_ports_numerically() {
    setup();
    let mut profile = small_profile();
    profile.ports_per_card = 11;
    let mut names = Vec::new();
    for slot in 0..2 {
        names.extend(card_ports(&profile, slot));
    }
    // BTreeMap-backed telemetry reports names lexicographically.
    names.sort();

    let groups = classify(&names, &profile).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].first[0], "FourHundredGigE0/0/0/0");
    assert_eq!(groups[0].first[10], "FourHundredGigE0/0/0/10");
    assert_eq!(groups[0].second[10], "FourHundredGigE0/1/0/10");
}
