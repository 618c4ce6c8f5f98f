//! Connectivity modes
//!
//! A [`ConnectMode`] classifies how a direct connection to a peer can be set
//! up. It is recomputed from scratch whenever the inputs change and never
//! transitions incrementally.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connectivity classification between the local user and a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectMode {
    /// The peer is the local user
    Me,
    /// Peer accepts incoming connections over IPv4
    ActiveV4,
    /// Peer accepts incoming connections over IPv6
    ActiveV6,
    /// Peer accepts incoming connections over both families
    ActiveDual,
    /// Peer is passive, we are reachable over IPv4 (or NAT traversal works)
    PassiveV4,
    /// Peer is passive, we are reachable over IPv6 (or NAT traversal works)
    PassiveV6,
    /// Peer addresses are hidden, IPv4 may work
    PassiveV4Unknown,
    /// Peer addresses are hidden, IPv6 may work
    PassiveV6Unknown,
    /// No common address family (resolution intermediate, never returned)
    NoConnectIp,
    /// Both sides passive and no way around it
    NoConnectPassive,
}

impl ConnectMode {
    /// Every mode, in declaration order
    pub const ALL: [ConnectMode; 10] = [
        ConnectMode::Me,
        ConnectMode::ActiveV4,
        ConnectMode::ActiveV6,
        ConnectMode::ActiveDual,
        ConnectMode::PassiveV4,
        ConnectMode::PassiveV6,
        ConnectMode::PassiveV4Unknown,
        ConnectMode::PassiveV6Unknown,
        ConnectMode::NoConnectIp,
        ConnectMode::NoConnectPassive,
    ];

    /// IPv4 connections may be attempted
    #[must_use]
    pub const fn allows_v4(self) -> bool {
        matches!(
            self,
            Self::PassiveV4 | Self::ActiveV4 | Self::PassiveV4Unknown | Self::ActiveDual
        )
    }

    /// IPv6 connections may be attempted
    #[must_use]
    pub const fn allows_v6(self) -> bool {
        matches!(
            self,
            Self::PassiveV6 | Self::ActiveV6 | Self::PassiveV6Unknown | Self::ActiveDual
        )
    }

    /// Any connection may be attempted
    #[must_use]
    pub const fn allows_connections(self) -> bool {
        self.allows_v4() || self.allows_v6()
    }

    /// The peer accepts incoming connections
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::ActiveV4 | Self::ActiveV6 | Self::ActiveDual)
    }
}

impl fmt::Display for ConnectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Me => "me",
            Self::ActiveV4 => "active (IPv4)",
            Self::ActiveV6 => "active (IPv6)",
            Self::ActiveDual => "active (IPv4 + IPv6)",
            Self::PassiveV4 => "passive (IPv4)",
            Self::PassiveV6 => "passive (IPv6)",
            Self::PassiveV4Unknown => "passive (IPv4, unverified)",
            Self::PassiveV6Unknown => "passive (IPv6, unverified)",
            Self::NoConnectIp => "no common address family",
            Self::NoConnectPassive => "no connectivity (both passive)",
        };
        f.write_str(name)
    }
}

/// IPv4 connections may be attempted in `mode`
#[must_use]
pub const fn allows_v4(mode: ConnectMode) -> bool {
    mode.allows_v4()
}

/// IPv6 connections may be attempted in `mode`
#[must_use]
pub const fn allows_v6(mode: ConnectMode) -> bool {
    mode.allows_v6()
}

/// The peer accepts incoming connections in `mode`
#[must_use]
pub const fn is_active(mode: ConnectMode) -> bool {
    mode.is_active()
}
