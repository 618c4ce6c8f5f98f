//! Property-based tests for dclink
//!
//! Uses proptest to verify invariants across large input spaces.

use proptest::prelude::*;

// ============================================================================
// Attribute Store Properties
// ============================================================================

mod attribute_properties {
    use super::*;
    use dclink_core::AttrCode;
    use dclink_integration_tests::remote_identity;

    fn attr_code() -> impl Strategy<Value = AttrCode> {
        "[A-Z][A-Z0-9]".prop_map(|code| code.parse::<AttrCode>().unwrap())
    }

    proptest! {
        /// A non-empty value reads back unchanged
        #[test]
        fn set_then_get(code in attr_code(), value in ".{1,64}") {
            let identity = remote_identity(&[], "");
            identity.set(code, value.as_str());
            prop_assert!(identity.is_set(code));
            prop_assert_eq!(identity.get(code), value);
        }

        /// An empty value removes the attribute
        #[test]
        fn set_empty_removes(code in attr_code(), value in ".{1,64}") {
            let identity = remote_identity(&[], "");
            identity.set(code, value.as_str());
            identity.set(code, "");
            prop_assert!(!identity.is_set(code));
            prop_assert_eq!(identity.get(code), "");
        }

        /// Supports are replaced, and every well-formed token is found
        #[test]
        fn supports_replace(first in prop::collection::vec("[A-Z0-9]{4}", 0..8),
                            second in prop::collection::vec("[A-Z0-9]{4}", 0..8)) {
            let identity = remote_identity(&[], "");
            identity.set_supports(&first.join(","));
            identity.set_supports(&second.join(","));

            let supports: Vec<String> = identity.supports().iter().map(ToString::to_string).collect();
            prop_assert_eq!(&supports, &second);
            for token in &second {
                prop_assert!(identity.has_support(token.parse().unwrap()));
            }
        }
    }
}

// ============================================================================
// Tag Properties
// ============================================================================

mod tag_properties {
    use super::*;
    use dclink_core::AttrCode;
    use dclink_integration_tests::remote_identity;

    const TAG_FIELDS: [AttrCode; 5] = [
        AttrCode::VERSION,
        AttrCode::HUBS_NORMAL,
        AttrCode::HUBS_REGISTERED,
        AttrCode::HUBS_OPERATOR,
        AttrCode::SLOTS,
    ];

    proptest! {
        /// Missing any required field yields an empty tag
        #[test]
        fn tag_requires_all_fields(present in prop::array::uniform5(any::<bool>())) {
            let identity = remote_identity(&[], "");
            for (code, set) in TAG_FIELDS.iter().zip(present) {
                if set {
                    identity.set(*code, "1");
                }
            }

            let complete = present.iter().all(|set| *set);
            prop_assert_eq!(!identity.tag().is_empty(), complete);
        }

        /// With all fields set, changing one changes the tag deterministically
        #[test]
        fn tag_tracks_each_field(
            values in prop::array::uniform5("[a-z0-9.]{1,6}"),
            field in 0usize..5,
            replacement in "[a-z0-9.]{1,6}",
        ) {
            prop_assume!(values[field] != replacement);

            let identity = remote_identity(&[], "");
            for (code, value) in TAG_FIELDS.iter().zip(&values) {
                identity.set(*code, value.as_str());
            }
            let before = identity.tag();
            prop_assert_eq!(
                &before,
                &format!("<{},M:--,H:{}/{}/{},S:{}>", values[0], values[1], values[2], values[3], values[4])
            );
            prop_assert_eq!(&before, &identity.tag());

            identity.set(TAG_FIELDS[field], replacement.as_str());
            let after = identity.tag();
            prop_assert_ne!(&before, &after);

            identity.set(TAG_FIELDS[field], values[field].as_str());
            prop_assert_eq!(before, identity.tag());
        }

        /// Hub count is the sum of whatever parses
        #[test]
        fn total_hub_count_sums(normal in 0i64..1000, registered in 0i64..1000, operator in 0i64..1000) {
            let identity = remote_identity(&[], "");
            identity.set(AttrCode::HUBS_NORMAL, normal.to_string());
            identity.set(AttrCode::HUBS_REGISTERED, registered.to_string());
            identity.set(AttrCode::HUBS_OPERATOR, operator.to_string());
            prop_assert_eq!(identity.total_hub_count(), normal + registered + operator);
        }
    }
}

// ============================================================================
// Resolver Properties
// ============================================================================

mod resolver_properties {
    use super::*;
    use dclink_core::resolver::{ActiveMode, AddressPresence, ResolveInput};
    use dclink_core::{ConnectMode, HubSettings, IncomingMode, IpFamily, resolve};

    fn incoming_mode() -> impl Strategy<Value = IncomingMode> {
        prop_oneof![
            Just(IncomingMode::Disabled),
            Just(IncomingMode::Active),
            Just(IncomingMode::ActiveUpnp),
            Just(IncomingMode::Passive),
        ]
    }

    fn hub() -> impl Strategy<Value = HubSettings> {
        (incoming_mode(), incoming_mode()).prop_map(|(v4, v6)| {
            HubSettings::new("adc://hub")
                .with_incoming(IpFamily::V4, v4)
                .with_incoming(IpFamily::V6, v6)
        })
    }

    fn input() -> impl Strategy<Value = ResolveInput> {
        (any::<[bool; 4]>(), any::<[bool; 4]>(), any::<bool>()).prop_map(
            |(active, addresses, nat)| ResolveInput {
                same_peer: false,
                self_active: ActiveMode::new(active[0], active[1]),
                peer_active: ActiveMode::new(active[2], active[3]),
                addresses: AddressPresence {
                    self_v4: addresses[0],
                    self_v6: addresses[1],
                    peer_v4: addresses[2],
                    peer_v6: addresses[3],
                },
                peer_nat_traversal: nat,
            },
        )
    }

    proptest! {
        /// The internal "no common family" state never escapes
        #[test]
        fn never_returns_no_connect_ip(input in input(), hub in hub()) {
            prop_assert_ne!(resolve(&input, &hub), ConnectMode::NoConnectIp);
        }

        /// The same pair always resolves the same way
        #[test]
        fn resolution_is_deterministic(input in input(), hub in hub()) {
            prop_assert_eq!(resolve(&input, &hub), resolve(&input, &hub));
        }

        /// Identical peers are always ME, whatever else is known
        #[test]
        fn same_peer_is_me(input in input(), hub in hub()) {
            let input = ResolveInput { same_peer: true, ..input };
            prop_assert_eq!(resolve(&input, &hub), ConnectMode::Me);
        }

        /// Dual only when both families are present on both sides
        #[test]
        fn dual_needs_both_families(input in input(), hub in hub()) {
            if resolve(&input, &hub) == ConnectMode::ActiveDual {
                let a = input.addresses;
                prop_assert!(a.self_v4 && a.self_v6 && a.peer_v4 && a.peer_v6);
                prop_assert!(input.peer_active.v4 && input.peer_active.v6);
            }
        }

        /// An active peer on a shared family is always reachable actively
        #[test]
        fn active_peer_on_shared_family_is_active(input in input(), hub in hub()) {
            let a = input.addresses;
            let shared_active = (a.self_v4 && a.peer_v4 && input.peer_active.v4)
                || (a.self_v6 && a.peer_v6 && input.peer_active.v6);
            if shared_active {
                prop_assert!(resolve(&input, &hub).is_active());
            }
        }

        /// Active modes always allow at least one family
        #[test]
        fn active_modes_allow_a_family(input in input(), hub in hub()) {
            let mode = resolve(&input, &hub);
            if mode.is_active() {
                prop_assert!(mode.allows_v4() || mode.allows_v6());
            }
        }
    }
}

// ============================================================================
// Identifier Properties
// ============================================================================

mod identifier_properties {
    use super::*;
    use dclink_core::{Cid, Sid};

    proptest! {
        /// CID text form parses back to the same bytes
        #[test]
        fn cid_text_form(bytes in any::<[u8; 24]>()) {
            let cid = Cid::from_bytes(bytes);
            let text = cid.to_string();
            prop_assert_eq!(text.len(), 39);
            prop_assert_eq!(text.parse::<Cid>().unwrap(), cid);
        }

        /// SIDs above 20 bits are rejected
        #[test]
        fn sid_range(value in any::<u32>()) {
            let sid = Sid::new(value);
            prop_assert_eq!(sid.is_ok(), value < (1 << 20));
            if let Ok(sid) = sid {
                prop_assert_eq!(sid.to_string().parse::<Sid>().unwrap(), sid);
            }
        }
    }
}
