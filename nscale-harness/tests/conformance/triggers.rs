//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use nscale_dut::store::DeviceStore;
use nscale_dut::telemetry::PortFlags;
use nscale_harness::consts::PROCESS_RESTART_DEADLINE;
use nscale_harness::error::Error;
use nscale_harness::validator::{PhaseState, VerifyPhases, validate};
use nscale_harness::verifier::NeighborExpectation;
use nscale_utils::addr::{AddressFamily, IpAddrExt};

use crate::{Scenario, small_profile};

// Input:
//  * Delete every provisioned static neighbor, then configure them again
// Output:
//  * Learned entries survive both mutations
//  * The index validates clean under the Deleted and StaticAdded phases
#[tokio::test]
async fn static_neighbor_lifecycle() {
    let scenario = Scenario::provisioned(small_profile()).await;
    scenario.verifier.probe_neighbors(&scenario.provisioned).await;

    let assignment = scenario.provisioned.assignments[0].clone();
    let at = assignment.at.clone();
    let dynamic = assignment.base.ipv4.dynamic_neighbor();
    let static_nbr = assignment.base.ipv4.static_neighbor();
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, dynamic, NeighborExpectation::Dynamic)
            .await
            .unwrap()
    );
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, static_nbr, NeighborExpectation::Static)
            .await
            .unwrap()
    );

    for assignment in &scenario.provisioned.assignments {
        for (_, base) in assignment.base.iter() {
            scenario
                .triggers
                .delete_static_neighbor(&assignment.at, base.static_neighbor())
                .await
                .unwrap();
        }
    }
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, static_nbr, NeighborExpectation::Absent)
            .await
            .unwrap()
    );
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, dynamic, NeighborExpectation::Dynamic)
            .await
            .unwrap()
    );

    let index = scenario.verifier.collect_index().await.unwrap();
    let phases = VerifyPhases {
        static_neighbor: PhaseState::Deleted,
        ..Default::default()
    };
    let report = validate(
        &index,
        &phases,
        scenario.provisioned.expected_index_len(),
    );
    assert!(report.is_clean(), "{:?}", report.violations());

    for assignment in &scenario.provisioned.assignments {
        for (_, base) in assignment.base.iter() {
            scenario
                .triggers
                .add_static_neighbor(&assignment.at, base.static_neighbor())
                .await
                .unwrap();
        }
    }
    scenario
        .triggers
        .await_neighbor(
            &at,
            static_nbr,
            NeighborExpectation::Static,
            PROCESS_RESTART_DEADLINE,
        )
        .await
        .unwrap();

    let index = scenario.verifier.collect_index().await.unwrap();
    let phases = VerifyPhases {
        static_neighbor: PhaseState::StaticAdded,
        ..Default::default()
    };
    let report = validate(
        &index,
        &phases,
        scenario.provisioned.expected_index_len(),
    );
    assert!(report.is_clean(), "{:?}", report.violations());
}

// Input:
//  * Flush the IPv4 neighbor cache of one sub-interface
// Output:
//  * Its learned IPv4 entry disappears; the configured static entry and
//    the IPv6 cache stay; a fresh probe round re-learns the entry
#[tokio::test]
async fn neighbor_cache_flush_spares_statics() {
    let scenario = Scenario::provisioned(small_profile()).await;
    scenario.verifier.probe_neighbors(&scenario.provisioned).await;

    let assignment = scenario.provisioned.assignments[0].clone();
    let at = assignment.at.clone();
    let dynamic = assignment.base.ipv4.dynamic_neighbor();
    let static_nbr = assignment.base.ipv4.static_neighbor();

    scenario
        .triggers
        .flush_neighbor_cache(&at, AddressFamily::Ipv4)
        .await
        .unwrap();
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, dynamic, NeighborExpectation::Absent)
            .await
            .unwrap()
    );
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, static_nbr, NeighborExpectation::Static)
            .await
            .unwrap()
    );
    assert!(
        scenario
            .verifier
            .neighbor_matches(
                &at,
                assignment.base.ipv6.dynamic_neighbor(),
                NeighborExpectation::Dynamic,
            )
            .await
            .unwrap()
    );

    scenario.verifier.probe_neighbors(&scenario.provisioned).await;
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, dynamic, NeighborExpectation::Dynamic)
            .await
            .unwrap()
    );

    let index = scenario.verifier.collect_index().await.unwrap();
    let report = validate(
        &index,
        &VerifyPhases::default(),
        scenario.provisioned.expected_index_len(),
    );
    assert!(report.is_clean(), "{:?}", report.violations());
}

// Input:
//  * Update the RA/prefix/DAD settings of every assignment, then delete
//    them
// Output:
//  * The index validates clean under the Updated phases, and again under
//    the Deleted phases once telemetry reports device defaults
#[tokio::test]
async fn nd_update_and_delete_phases() {
    let scenario = Scenario::provisioned(small_profile()).await;
    scenario.verifier.probe_neighbors(&scenario.provisioned).await;
    let minimum = scenario.provisioned.expected_index_len();

    for assignment in &scenario.provisioned.assignments {
        scenario.triggers.update_nd(assignment).await.unwrap();
    }
    let index = scenario.verifier.collect_index().await.unwrap();
    let phases = VerifyPhases {
        ra: PhaseState::Updated,
        prefix: PhaseState::Updated,
        dad: PhaseState::Updated,
        ..Default::default()
    };
    let report = validate(&index, &phases, minimum);
    assert!(report.is_clean(), "{:?}", report.violations());

    for assignment in &scenario.provisioned.assignments {
        scenario.triggers.delete_nd(assignment).await.unwrap();
    }
    let index = scenario.verifier.collect_index().await.unwrap();
    let phases = VerifyPhases {
        ra: PhaseState::Deleted,
        prefix: PhaseState::Deleted,
        dad: PhaseState::Deleted,
        ..Default::default()
    };
    let report = validate(&index, &phases, minimum);
    assert!(report.is_clean(), "{:?}", report.violations());
}

// Input:
//  * Detach one bundle member, try to steal the other, re-attach
// Output:
//  * The member flag follows the attachment; exclusive ownership holds
#[tokio::test]
async fn member_port_flap() {
    let mut scenario = Scenario::provisioned(small_profile()).await;
    let (bundle, members) = scenario
        .provisioned
        .bundles
        .iter()
        .next()
        .map(|(bundle, members)| (bundle.to_owned(), members.to_vec()))
        .unwrap();

    scenario
        .triggers
        .remove_bundle_member(
            &mut scenario.provisioned.bundles,
            &bundle,
            &members[0],
        )
        .await
        .unwrap();
    let flags = scenario.device.port_flags(&members[0]).await.unwrap();
    assert!(!flags.contains(PortFlags::BUNDLE_MEMBER));
    let flags = scenario.device.port_flags(&members[1]).await.unwrap();
    assert!(flags.contains(PortFlags::BUNDLE_MEMBER));

    // The remaining member still belongs to its bundle.
    let error = scenario
        .triggers
        .add_bundle_member(
            &mut scenario.provisioned.bundles,
            "Bundle-Ether9",
            &members[1],
        )
        .await
        .unwrap_err();
    assert!(matches!(error, Error::BundleOwnership { .. }));

    scenario
        .triggers
        .add_bundle_member(
            &mut scenario.provisioned.bundles,
            &bundle,
            &members[0],
        )
        .await
        .unwrap();
    let flags = scenario.device.port_flags(&members[0]).await.unwrap();
    assert!(flags.contains(PortFlags::BUNDLE_MEMBER));
    assert_eq!(scenario.provisioned.bundles.members(&bundle).len(), 2);
}

// Input:
//  * Reload the line-card component hosting the group's first card
// Output:
//  * The trigger returns once every port reports operational again
//  * Flushed caches re-learn on the next probe round and validate clean
#[tokio::test]
async fn component_reload_recovers() {
    let scenario = Scenario::provisioned(small_profile()).await;
    scenario.verifier.probe_neighbors(&scenario.provisioned).await;

    let error = scenario
        .triggers
        .reload_component("9/9", &[])
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Control(_)));

    let ports = scenario.groups[0].first.clone();
    scenario
        .triggers
        .reload_component("0/0", &ports)
        .await
        .unwrap();

    // The outage flushed the card's learned entries.
    let assignment = scenario.provisioned.assignments[0].clone();
    let dynamic = assignment.base.ipv4.dynamic_neighbor();
    assert!(
        scenario
            .verifier
            .neighbor_matches(
                &assignment.at,
                dynamic,
                NeighborExpectation::Absent,
            )
            .await
            .unwrap()
    );

    let stats =
        scenario.verifier.probe_neighbors(&scenario.provisioned).await;
    assert_eq!(stats.answered, 4 * scenario.provisioned.assignments.len());

    let index = scenario.verifier.collect_index().await.unwrap();
    let report = validate(
        &index,
        &VerifyPhases::default(),
        scenario.provisioned.expected_index_len(),
    );
    assert!(report.is_clean(), "{:?}", report.violations());
}

// Input:
//  * Restart the per-family neighbor-resolution processes
// Output:
//  * Each restart flushes only its own family's learned entries; probing
//    converges again within the restart deadline
#[tokio::test]
async fn process_restart_flushes_one_family() {
    let scenario = Scenario::provisioned(small_profile()).await;
    scenario.verifier.probe_neighbors(&scenario.provisioned).await;

    let assignment = scenario.provisioned.assignments[0].clone();
    let at = assignment.at.clone();
    let dynamic_v4 = assignment.base.ipv4.dynamic_neighbor();
    let dynamic_v6 = assignment.base.ipv6.dynamic_neighbor();

    let error =
        scenario.triggers.restart_process("bgp").await.unwrap_err();
    assert!(matches!(error, Error::Control(_)));

    scenario.triggers.restart_process("arp").await.unwrap();
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, dynamic_v4, NeighborExpectation::Absent)
            .await
            .unwrap()
    );
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, dynamic_v6, NeighborExpectation::Dynamic)
            .await
            .unwrap()
    );

    scenario.triggers.restart_process("ipv6_nd").await.unwrap();
    assert!(
        scenario
            .verifier
            .neighbor_matches(&at, dynamic_v6, NeighborExpectation::Absent)
            .await
            .unwrap()
    );

    scenario.verifier.probe_neighbors(&scenario.provisioned).await;
    scenario
        .triggers
        .await_neighbor(
            &at,
            dynamic_v4,
            NeighborExpectation::Dynamic,
            PROCESS_RESTART_DEADLINE,
        )
        .await
        .unwrap();
    scenario
        .triggers
        .await_neighbor(
            &at,
            dynamic_v6,
            NeighborExpectation::Dynamic,
            PROCESS_RESTART_DEADLINE,
        )
        .await
        .unwrap();
}

// Input:
//  * Reboot the device
// Output:
//  * The trigger returns once every reserved port is operational; the
//    configured state survives and the caches re-learn
#[tokio::test]
async fn reboot_recovers_all_ports() {
    let scenario = Scenario::provisioned(small_profile()).await;
    scenario.verifier.probe_neighbors(&scenario.provisioned).await;

    let ports = scenario.groups[0]
        .first
        .iter()
        .chain(&scenario.groups[0].second)
        .cloned()
        .collect::<Vec<_>>();
    scenario.triggers.reboot(&ports).await.unwrap();
    for port in &ports {
        let flags = scenario.device.port_flags(port).await.unwrap();
        assert!(flags.contains(PortFlags::OPERATIVE));
    }

    // Config survives the reboot; learned state does not.
    let assignment = scenario.provisioned.assignments[0].clone();
    assert!(
        scenario
            .verifier
            .neighbor_matches(
                &assignment.at,
                assignment.base.ipv4.static_neighbor(),
                NeighborExpectation::Static,
            )
            .await
            .unwrap()
    );
    assert!(
        scenario
            .verifier
            .neighbor_matches(
                &assignment.at,
                assignment.base.ipv4.dynamic_neighbor(),
                NeighborExpectation::Absent,
            )
            .await
            .unwrap()
    );

    let stats =
        scenario.verifier.probe_neighbors(&scenario.provisioned).await;
    assert_eq!(stats.answered, 4 * scenario.provisioned.assignments.len());

    let index = scenario.verifier.collect_index().await.unwrap();
    let report = validate(
        &index,
        &VerifyPhases::default(),
        scenario.provisioned.expected_index_len(),
    );
    assert!(report.is_clean(), "{:?}", report.violations());
}
