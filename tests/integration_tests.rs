//! Integration tests for connectivity resolution and hub user lists.
//!
//! Drives identities, session users and hub user lists together the way a
//! hub connection does: attributes arrive, modes are recomputed, listeners
//! hear about changes.

use dclink_core::{
    AttrCode, Cid, ConnectMode, ConnectModeChanged, HubContext, HubSettings, HubUsers, IncomingMode,
    OnlineUser, Peer, PeerRegistry, ProfileSettings, Sid, allows_v4, allows_v6, is_active,
    resolve_tcp, resolve_udp, update_connect_modes,
};
use dclink_integration_tests::{
    MY_IP4, MY_IP6, PEER_IP4, PEER_IP6, active_hub, hub, legacy_identity, local_identity,
    passive_hub, remote_identity,
};
use parking_lot::Mutex;
use std::sync::Arc;

// ============================================================================
// Resolution Scenarios
// ============================================================================

#[test]
fn test_ipv6_only_active_peer() {
    let me = local_identity(&[(AttrCode::IP6, MY_IP6)], "");
    let peer = remote_identity(&[(AttrCode::IP6, PEER_IP6)], "TCP6");

    assert_eq!(resolve_tcp(&me, &peer, &active_hub()), ConnectMode::ActiveV6);
}

#[test]
fn test_dual_stack_active_peer() {
    let me = local_identity(&[(AttrCode::IP4, MY_IP4), (AttrCode::IP6, MY_IP6)], "");
    let peer = remote_identity(
        &[(AttrCode::IP4, PEER_IP4), (AttrCode::IP6, PEER_IP6)],
        "TCP4,TCP6",
    );

    let mode = resolve_tcp(&me, &peer, &active_hub());
    assert_eq!(mode, ConnectMode::ActiveDual);
    assert!(allows_v4(mode));
    assert!(allows_v6(mode));
    assert!(is_active(mode));
}

#[test]
fn test_both_passive_ipv4() {
    let me = local_identity(&[(AttrCode::IP4, MY_IP4)], "");
    let peer = remote_identity(&[(AttrCode::IP4, PEER_IP4)], "");

    assert_eq!(
        resolve_tcp(&me, &peer, &passive_hub()),
        ConnectMode::NoConnectPassive
    );
}

#[test]
fn test_hidden_addresses_through_active_hub() {
    let me = local_identity(&[], "");
    let peer = remote_identity(&[], "");

    assert_eq!(
        resolve_tcp(&me, &peer, &hub(IncomingMode::Active, IncomingMode::Disabled)),
        ConnectMode::PassiveV4Unknown
    );
}

#[test]
fn test_hidden_addresses_prefers_v6_guess() {
    let me = local_identity(&[(AttrCode::IP6, MY_IP6)], "");
    let peer = remote_identity(&[], "NAT0");

    assert_eq!(
        resolve_tcp(&me, &peer, &passive_hub()),
        ConnectMode::PassiveV6Unknown
    );
}

#[test]
fn test_active_v6_not_downgraded_by_passive_v4() {
    let me = local_identity(
        &[(AttrCode::IP4, MY_IP4), (AttrCode::IP6, MY_IP6)],
        "TCP4",
    );
    let peer = remote_identity(
        &[(AttrCode::IP4, PEER_IP4), (AttrCode::IP6, PEER_IP6)],
        "TCP6",
    );

    assert_eq!(resolve_tcp(&me, &peer, &active_hub()), ConnectMode::ActiveV6);
}

#[test]
fn test_resolution_is_asymmetric() {
    let a = local_identity(&[(AttrCode::IP4, MY_IP4)], "TCP4");
    let b = remote_identity(&[(AttrCode::IP4, PEER_IP4)], "");
    let hub = passive_hub();

    assert_eq!(resolve_tcp(&a, &b, &hub), ConnectMode::PassiveV4);
    assert_eq!(resolve_tcp(&b, &a, &hub), ConnectMode::ActiveV4);
}

#[test]
fn test_udp_has_no_nat_traversal_fallback() {
    let me = local_identity(&[(AttrCode::IP4, MY_IP4)], "");
    let peer = remote_identity(&[(AttrCode::IP4, PEER_IP4)], "NAT0");
    let hub = passive_hub();

    assert_eq!(resolve_tcp(&me, &peer, &hub), ConnectMode::PassiveV4);
    assert_eq!(resolve_udp(&me, &peer, &hub), ConnectMode::NoConnectPassive);
}

#[test]
fn test_same_peer_is_me() {
    let me = local_identity(&[(AttrCode::IP4, MY_IP4)], "TCP4");
    let again = dclink_core::Identity::new(Arc::clone(me.peer()), Sid::from(7u16));

    assert_eq!(resolve_tcp(&me, &again, &active_hub()), ConnectMode::Me);
    assert_eq!(resolve_udp(&me, &again, &active_hub()), ConnectMode::Me);
}

#[test]
fn test_update_reports_changes_once() {
    let me = local_identity(&[(AttrCode::IP4, MY_IP4)], "TCP4,UDP4");
    let peer = remote_identity(
        &[(AttrCode::IP4, PEER_IP4), (AttrCode::UDP4_PORT, "4000")],
        "TCP4,UDP4",
    );
    let hub = active_hub();

    assert_eq!(peer.cached_tcp_mode(), None);
    assert!(update_connect_modes(&me, &peer, &hub));
    assert!(!update_connect_modes(&me, &peer, &hub));
    assert_eq!(peer.cached_tcp_mode(), Some(ConnectMode::ActiveV4));
    assert_eq!(peer.cached_udp_mode(), Some(ConnectMode::ActiveV4));
    assert!(peer.is_udp_active());
    assert_eq!(peer.udp_ip(), PEER_IP4);

    peer.set(AttrCode::UDP4_PORT, "");
    assert!(update_connect_modes(&me, &peer, &hub));
    assert_eq!(peer.cached_tcp_mode(), Some(ConnectMode::ActiveV4));
    assert!(!peer.is_udp_active());
}

#[test]
fn test_legacy_peer_bypasses_cache() {
    let active = legacy_identity(false);
    let passive = legacy_identity(true);

    assert_eq!(active.tcp_connect_mode(), Some(ConnectMode::ActiveV4));
    assert_eq!(passive.tcp_connect_mode(), Some(ConnectMode::PassiveV4));
    assert!(active.has_active_tcp_connectivity(None));
    assert!(!passive.has_active_tcp_connectivity(None));
}

// ============================================================================
// Queued Byte Accounting
// ============================================================================

#[test]
fn test_queued_bytes_balance() {
    let peer = Peer::new(Cid::generate());
    peer.add_queued(100);
    peer.remove_queued(100);
    assert_eq!(peer.queued(), 0);
}

#[test]
#[should_panic(expected = "went negative")]
fn test_queued_bytes_underflow_is_fatal() {
    let peer = Peer::new(Cid::generate());
    peer.add_queued(100);
    peer.remove_queued(100);
    peer.remove_queued(1);
}

// ============================================================================
// Hub User Lists
// ============================================================================

fn hub_users(settings: HubSettings) -> HubUsers {
    HubUsers::new(Arc::new(settings))
}

#[test]
fn test_peer_shared_across_hubs() {
    let registry = PeerRegistry::new(Cid::generate());
    let first = hub_users(active_hub());
    let second = hub_users(passive_hub());

    let cid = Cid::generate();
    let a = first.peer_joined(registry.get_or_insert(cid), Sid::from(1u16));
    let b = second.peer_joined(registry.get_or_insert(cid), Sid::from(40u16));

    assert!(Arc::ptr_eq(a.peer(), b.peer()));
    a.identity().set(AttrCode::NICK, "alice");
    assert_eq!(b.identity().nick(), "");

    drop((a, b));
    first.clear();
    assert_eq!(registry.prune(), 0);
    second.clear();
    assert_eq!(registry.prune(), 1);
    assert!(registry.get(&cid).is_none());
}

#[test]
fn test_refresh_after_local_change() {
    let users = hub_users(passive_hub());
    let user = users.peer_joined(Arc::new(Peer::new(Cid::generate())), Sid::from(3u16));
    user.identity().set(AttrCode::IP4, PEER_IP4);

    let changes = Arc::new(Mutex::new(Vec::<ConnectModeChanged>::new()));
    let sink = Arc::clone(&changes);
    users
        .mode_changes()
        .subscribe(move |change: &ConnectModeChanged| sink.lock().push(change.clone()));

    let me = local_identity(&[(AttrCode::IP4, MY_IP4)], "");
    assert_eq!(users.refresh_connect_modes(&me), 1);
    assert_eq!(
        user.tcp_connect_mode(),
        Some(ConnectMode::NoConnectPassive)
    );

    // Going active changes what the peer can do with us
    me.set_supports("TCP4");
    assert_eq!(users.refresh_connect_modes(&me), 1);
    assert_eq!(user.tcp_connect_mode(), Some(ConnectMode::PassiveV4));

    let seen = changes.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].sid, Sid::from(3u16));
    assert_eq!(seen[1].cid, *user.peer().cid());
    assert_eq!(seen[1].tcp, Some(ConnectMode::PassiveV4));
}

#[test]
fn test_info_update_recomputes_modes() {
    let users = hub_users(active_hub());
    let sid = Sid::from(12u16);
    users.peer_joined(Arc::new(Peer::new(Cid::generate())), sid);

    let changes = Arc::new(Mutex::new(Vec::<ConnectModeChanged>::new()));
    let sink = Arc::clone(&changes);
    users
        .mode_changes()
        .subscribe(move |change: &ConnectModeChanged| sink.lock().push(change.clone()));

    let me = local_identity(&[(AttrCode::IP4, MY_IP4), (AttrCode::IP6, MY_IP6)], "TCP4");
    assert!(users.update_attributes(
        sid,
        [
            (AttrCode::NICK, "alice"),
            (AttrCode::IP4, PEER_IP4),
            (AttrCode::SUPPORTS, "TCP4,TCP6"),
        ],
        &me,
    ));
    let user = users.get(sid).unwrap();
    assert_eq!(user.tcp_connect_mode(), Some(ConnectMode::ActiveV4));

    assert!(users.update_attributes(sid, [(AttrCode::IP6, PEER_IP6)], &me));
    assert_eq!(user.tcp_connect_mode(), Some(ConnectMode::ActiveDual));

    assert!(!users.update_attributes(sid, [(AttrCode::DESCRIPTION, "hi")], &me));

    let seen = changes.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].tcp, Some(ConnectMode::ActiveDual));
}

#[test]
fn test_rejoin_replaces_session_user() {
    let registry = PeerRegistry::new(Cid::generate());
    let users = hub_users(active_hub());
    let cid = Cid::generate();

    users.peer_joined(registry.get_or_insert(cid), Sid::from(1u16));
    users.peer_joined(registry.get_or_insert(cid), Sid::from(2u16));

    assert_eq!(users.len(), 1);
    assert_eq!(users.find_by_cid(&cid).unwrap().sid(), Sid::from(2u16));
}

#[test]
fn test_listener_may_mutate_user_list() {
    let users = Arc::new(hub_users(active_hub()));
    for sid in 1u16..=3 {
        let user = users.peer_joined(Arc::new(Peer::new(Cid::generate())), Sid::from(sid));
        user.identity().set(AttrCode::IP4, PEER_IP4);
        user.identity().set_supports("TCP4");
    }

    let list = Arc::clone(&users);
    users.mode_changes().subscribe(move |change: &ConnectModeChanged| {
        list.peer_left(change.sid);
    });

    let me = local_identity(&[(AttrCode::IP4, MY_IP4)], "");
    assert_eq!(users.refresh_connect_modes(&me), 3);
    assert!(users.is_empty());
}

#[test]
fn test_dropped_hub_stops_resolution() {
    let hub: Arc<dyn HubContext> = Arc::new(active_hub());
    let user = OnlineUser::new(Arc::new(Peer::new(Cid::generate())), &hub, Sid::from(9u16));
    user.identity().set(AttrCode::IP4, PEER_IP4);

    drop(hub);
    let me = local_identity(&[(AttrCode::IP4, MY_IP4)], "TCP4");
    assert!(!user.update_connect_modes(&me));
    assert_eq!(user.tcp_connect_mode(), None);
    assert_eq!(user.hub_name(), "");
}

#[test]
fn test_sorted_listing_ignores_case() {
    let users = hub_users(active_hub());
    for (sid, nick) in [(1u16, "zed"), (2, "Mallory"), (3, "alice"), (4, "Bob")] {
        let user = users.peer_joined(Arc::new(Peer::new(Cid::generate())), Sid::from(sid));
        user.identity().set(AttrCode::NICK, nick);
    }

    let nicks: Vec<String> = users
        .sorted_by_nick()
        .iter()
        .map(|user| user.identity().nick())
        .collect();
    assert_eq!(nicks, ["alice", "Bob", "Mallory", "zed"]);
}

// ============================================================================
// Profile Publishing
// ============================================================================

#[test]
fn test_profile_produces_tag() {
    let mut profile = ProfileSettings::default();
    profile.set_nick("alice");
    profile.set_slots(4);

    let me = local_identity(&[(AttrCode::IP4, MY_IP4)], "TCP4");
    profile.apply_to(&me);
    assert_eq!(me.tag(), "");

    me.set(AttrCode::HUBS_NORMAL, "2");
    me.set(AttrCode::HUBS_REGISTERED, "1");
    me.set(AttrCode::HUBS_OPERATOR, "0");

    let expected = format!(
        "<dclink {},M:A-,H:2/1/0,S:4>",
        me.get(AttrCode::VERSION)
    );
    assert_eq!(me.tag(), expected);
    assert_eq!(me.total_hub_count(), 3);
}
