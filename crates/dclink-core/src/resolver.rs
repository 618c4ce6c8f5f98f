//! Connectivity mode resolution
//!
//! Decides whether and how a direct connection between the local user and a
//! peer can be made. The decision is a flat classification evaluated in a
//! fixed order:
//!
//! 1. Same peer on both sides: [`ConnectMode::Me`].
//! 2. IPv6 pass (both sides have an IPv6 address): active if the peer is
//!    active, passive if we are active or the peer can traverse NAT.
//! 3. IPv4 pass (both sides have an IPv4 address): an active peer upgrades
//!    an active IPv6 result to dual; passive IPv4 never overrides an IPv6
//!    result.
//! 4. Neither family matched (the hub may hide addresses): fall back on the
//!    peer's advertised activity and the hub's incoming settings, then on
//!    an unverified passive guess.
//!
//! The result is not symmetric: resolving (A, B) may differ from (B, A).

use crate::feature::Feature;
use crate::hub::{HubContext, IpFamily};
use crate::identity::Identity;
use crate::mode::ConnectMode;

/// Activity per address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveMode {
    /// Active over IPv4
    pub v4: bool,
    /// Active over IPv6
    pub v6: bool,
}

impl ActiveMode {
    /// Create from per-family flags
    #[must_use]
    pub const fn new(v4: bool, v6: bool) -> Self {
        Self { v4, v6 }
    }

    /// Active over at least one family
    #[must_use]
    pub const fn any(&self) -> bool {
        self.v4 || self.v6
    }
}

/// Which address families each side has an address for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressPresence {
    /// Local user has an IPv4 address
    pub self_v4: bool,
    /// Local user has an IPv6 address
    pub self_v6: bool,
    /// Peer has an IPv4 address
    pub peer_v4: bool,
    /// Peer has an IPv6 address
    pub peer_v6: bool,
}

impl AddressPresence {
    /// Read address presence from two identities
    #[must_use]
    pub fn of(me: &Identity, other: &Identity) -> Self {
        Self {
            self_v4: !me.ip4().is_empty(),
            self_v6: !me.ip6().is_empty(),
            peer_v4: !other.ip4().is_empty(),
            peer_v6: !other.ip6().is_empty(),
        }
    }
}

/// Resolution inputs for one pair of identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveInput {
    /// Both identities belong to the same peer
    pub same_peer: bool,
    /// Local activity
    pub self_active: ActiveMode,
    /// Peer activity
    pub peer_active: ActiveMode,
    /// Address presence on both sides
    pub addresses: AddressPresence,
    /// Peer supports NAT traversal
    pub peer_nat_traversal: bool,
}

/// Classify connectivity from already-read inputs
///
/// Pure function of its arguments. Never returns [`ConnectMode::NoConnectIp`].
#[must_use]
pub fn resolve(input: &ResolveInput, hub: &dyn HubContext) -> ConnectMode {
    if input.same_peer {
        return ConnectMode::Me;
    }

    let ResolveInput {
        self_active,
        peer_active,
        addresses,
        peer_nat_traversal,
        ..
    } = *input;

    let mut mode = ConnectMode::NoConnectIp;

    if addresses.self_v6 && addresses.peer_v6 {
        if peer_active.v6 {
            mode = ConnectMode::ActiveV6;
        } else if self_active.v6 || peer_nat_traversal {
            mode = ConnectMode::PassiveV6;
        }
    }

    if addresses.self_v4 && addresses.peer_v4 {
        if peer_active.v4 {
            mode = if mode == ConnectMode::ActiveV6 {
                ConnectMode::ActiveDual
            } else {
                ConnectMode::ActiveV4
            };
        } else if mode == ConnectMode::NoConnectIp && (self_active.v4 || peer_nat_traversal) {
            // passive IPv4 is no better than passive IPv6
            mode = ConnectMode::PassiveV4;
        }
    }

    if mode == ConnectMode::NoConnectIp {
        mode = resolve_without_common_family(input, hub);
    }

    tracing::trace!(?input, %mode, hub = hub.hub_url(), "Resolved connect mode");
    mode
}

/// No address family matched on both sides
///
/// Either the hub hides addresses or the secondary protocol could not be
/// verified, so fall back on what the peer advertised.
fn resolve_without_common_family(input: &ResolveInput, hub: &dyn HubContext) -> ConnectMode {
    let ResolveInput {
        self_active,
        peer_active,
        addresses,
        peer_nat_traversal,
        ..
    } = *input;

    if peer_active.v4 && !hub.incoming_connections_disabled(IpFamily::V4) {
        return ConnectMode::ActiveV4;
    }

    if peer_active.v6 && !hub.incoming_connections_disabled(IpFamily::V6) {
        return ConnectMode::ActiveV6;
    }

    if !self_active.any() && !peer_nat_traversal && !hub.is_active() {
        return ConnectMode::NoConnectPassive;
    }

    // The peer may still speak the same protocol, there is no way to tell
    if addresses.self_v6 {
        ConnectMode::PassiveV6Unknown
    } else {
        ConnectMode::PassiveV4Unknown
    }
}

fn same_peer(me: &Identity, other: &Identity) -> bool {
    me.peer().cid() == other.peer().cid()
}

/// Resolve the TCP connect mode from `me` towards `other`
#[must_use]
pub fn resolve_tcp(me: &Identity, other: &Identity, hub: &dyn HubContext) -> ConnectMode {
    let input = ResolveInput {
        same_peer: same_peer(me, other),
        self_active: ActiveMode::new(me.is_tcp4_active(None), me.is_tcp6_active()),
        peer_active: ActiveMode::new(other.is_tcp4_active(None), other.is_tcp6_active()),
        addresses: AddressPresence::of(me, other),
        peer_nat_traversal: other.has_support(Feature::NAT_TRAVERSAL),
    };
    resolve(&input, hub)
}

/// Resolve the UDP mode from `me` towards `other`
///
/// UDP has no NAT traversal fallback.
#[must_use]
pub fn resolve_udp(me: &Identity, other: &Identity, hub: &dyn HubContext) -> ConnectMode {
    let input = ResolveInput {
        same_peer: same_peer(me, other),
        self_active: ActiveMode::new(me.is_udp4_active(), me.is_udp6_active()),
        peer_active: ActiveMode::new(other.is_udp4_active(), other.is_udp6_active()),
        addresses: AddressPresence::of(me, other),
        peer_nat_traversal: false,
    };
    resolve(&input, hub)
}

/// Recompute and cache both modes of `other`, returning true if either changed
///
/// Only compares and stores; notifying anyone about the change is up to the
/// caller.
pub fn update_connect_modes(me: &Identity, other: &Identity, hub: &dyn HubContext) -> bool {
    let tcp = resolve_tcp(me, other, hub);
    let udp = resolve_udp(me, other, hub);
    other.store_connect_modes(tcp, udp)
}
