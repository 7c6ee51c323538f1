//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use derive_new::new;
use itertools::Itertools;

use crate::debug::Debug;
use crate::error::Error;
use crate::profile::Profile;

// Interface names of a paired set of line cards. `first` and `second` each
// hold the usable ports of one card, ordered by ascending port number.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(new)]
pub struct LineCardGroup {
    pub first: Vec<String>,
    pub second: Vec<String>,
}

// ===== global functions =====

// Buckets the DUT's interface names per line card and pairs the cards in
// slot order. Names that don't carry a recognized speed prefix or that sit
// outside the profile's rack/slot range are ignored. Fails before any
// configuration is pushed if a card exposes fewer usable ports than the
// profile calls for.
pub fn classify(
    names: &[String],
    profile: &Profile,
) -> Result<Vec<LineCardGroup>, Error> {
    let mut buckets: BTreeMap<(usize, u8), Vec<String>> = BTreeMap::new();
    for name in names {
        let Some(location) = card_location(name, profile) else {
            continue;
        };
        buckets.entry(location).or_default().push(name.clone());
    }

    let required = profile.ports_per_card;
    let mut cards = Vec::with_capacity(buckets.len());
    for mut bucket in buckets.into_values() {
        // Name length is a proxy for numeric port order ("...9" sorts
        // before "...10"). The sort is stable, so equal-length names keep
        // the DUT's reporting order.
        bucket.sort_by_key(|name| name.len());
        if bucket.len() < required {
            return Err(Error::InsufficientPorts {
                found: bucket.len(),
                required,
            });
        }
        bucket.truncate(required);
        cards.push(bucket);
    }

    let groups = cards
        .into_iter()
        .tuples()
        .map(|(first, second)| LineCardGroup::new(first, second))
        .collect::<Vec<_>>();
    Debug::GroupsClassified(groups.len()).log();

    Ok(groups)
}

// ===== helper functions =====

fn card_location(name: &str, profile: &Profile) -> Option<(usize, u8)> {
    let prefix = profile
        .name_prefixes
        .iter()
        .position(|prefix| name.starts_with(prefix.as_str()))?;
    let location = &name[profile.name_prefixes[prefix].len()..];
    let mut tokens = location.split('/');
    let rack = tokens.next()?.parse::<u8>().ok()?;
    let slot = tokens.next()?.parse::<u8>().ok()?;
    // A name without a port token is the card itself, not a port.
    tokens.next()?;
    if rack != 0 || slot >= profile.slots {
        return None;
    }
    Some((prefix, slot))
}

// ===== tests =====

#[cfg(test)]
mod test_classify {
    use super::*;

    fn names(card: &str, ports: std::ops::Range<u32>) -> Vec<String> {
        ports.map(|port| format!("{}/{}", card, port)).collect()
    }

    #[test]
    fn paired_cards() {
        let profile = Profile::default();
        let mut input = names("FourHundredGigE0/0", 0..9);
        input.extend(names("FourHundredGigE0/1", 0..9));

        let groups = classify(&input, &profile).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].first.len(), 9);
        assert_eq!(groups[0].second.len(), 9);
        assert_eq!(groups[0].first[0], "FourHundredGigE0/0/0");
        assert_eq!(groups[0].second[0], "FourHundredGigE0/1/0");
    }

    #[test]
    fn length_sort_orders_ports() {
        let profile = Profile {
            ports_per_card: 3,
            ..Default::default()
        };
        let input = vec![
            "HundredGigE0/0/0/10".to_owned(),
            "HundredGigE0/0/0/2".to_owned(),
            "HundredGigE0/0/0/1".to_owned(),
            "HundredGigE0/1/0/1".to_owned(),
            "HundredGigE0/1/0/2".to_owned(),
            "HundredGigE0/1/0/3".to_owned(),
        ];

        let groups = classify(&input, &profile).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].first,
            vec![
                "HundredGigE0/0/0/2".to_owned(),
                "HundredGigE0/0/0/1".to_owned(),
                "HundredGigE0/0/0/10".to_owned(),
            ]
        );
    }

    #[test]
    fn foreign_names_ignored() {
        let profile = Profile {
            ports_per_card: 2,
            ..Default::default()
        };
        let input = vec![
            "MgmtEth0/RP0/CPU0/0".to_owned(),
            "Loopback0".to_owned(),
            "FourHundredGigE0/0".to_owned(),
            "FourHundredGigE9/0/0/0".to_owned(),
            "FourHundredGigE0/0/0/0".to_owned(),
            "FourHundredGigE0/0/0/1".to_owned(),
            "FourHundredGigE0/1/0/0".to_owned(),
            "FourHundredGigE0/1/0/1".to_owned(),
        ];

        let groups = classify(&input, &profile).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].first.len(), 2);
    }

    #[test]
    fn undersized_card_is_a_precondition_error() {
        let profile = Profile::default();
        let input = names("FourHundredGigE0/0", 0..4);

        match classify(&input, &profile) {
            Err(Error::InsufficientPorts { found, required }) => {
                assert_eq!(found, 4);
                assert_eq!(required, 9);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unpaired_card_is_dropped() {
        let profile = Profile {
            ports_per_card: 1,
            ..Default::default()
        };
        let input = vec![
            "HundredGigE0/0/0/0".to_owned(),
            "HundredGigE0/1/0/0".to_owned(),
            "HundredGigE0/2/0/0".to_owned(),
        ];

        let groups = classify(&input, &profile).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].second, vec!["HundredGigE0/1/0/0".to_owned()]);
    }
}
