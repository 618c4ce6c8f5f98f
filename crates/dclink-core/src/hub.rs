//! Hub context seen by the connectivity resolver
//!
//! The resolver never talks to a hub connection directly. It asks the
//! [`HubContext`] two questions per address family: is the local client
//! actively reachable through this hub, and are incoming connections
//! administratively disabled. [`HubSettings`] answers them from the per-hub
//! incoming-connection configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// IP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => f.write_str("IPv4"),
            Self::V6 => f.write_str("IPv6"),
        }
    }
}

/// Per-hub view consumed by connectivity resolution
pub trait HubContext: Send + Sync {
    /// Hub address
    fn hub_url(&self) -> &str;

    /// Hub display name
    fn hub_name(&self) -> &str;

    /// The local client accepts incoming connections on `family` in this hub
    fn is_actively_reachable(&self, family: IpFamily) -> bool;

    /// Incoming connections on `family` are disabled for this hub
    fn incoming_connections_disabled(&self, family: IpFamily) -> bool;

    /// Actively reachable on at least one family
    fn is_active(&self) -> bool {
        self.is_actively_reachable(IpFamily::V4) || self.is_actively_reachable(IpFamily::V6)
    }
}

/// Incoming connection setting for one address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomingMode {
    /// No connectivity over this family at all
    Disabled,
    /// Directly reachable
    #[default]
    Active,
    /// Reachable through a UPnP port mapping
    ActiveUpnp,
    /// Behind a firewall, only outgoing connections
    Passive,
}

impl IncomingMode {
    /// Incoming connections are accepted
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active | Self::ActiveUpnp)
    }
}

/// Connection settings of one hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSettings {
    /// Hub address
    pub url: String,

    /// Hub display name
    #[serde(default)]
    pub name: String,

    /// IPv4 incoming connection mode
    #[serde(default)]
    pub incoming_v4: IncomingMode,

    /// IPv6 incoming connection mode
    #[serde(default = "default_incoming_v6")]
    pub incoming_v6: IncomingMode,
}

fn default_incoming_v6() -> IncomingMode {
    IncomingMode::Disabled
}

impl HubSettings {
    /// Settings for `url` with default incoming modes
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: String::new(),
            incoming_v4: IncomingMode::default(),
            incoming_v6: default_incoming_v6(),
        }
    }

    /// Builder-style incoming mode override
    #[must_use]
    pub fn with_incoming(mut self, family: IpFamily, mode: IncomingMode) -> Self {
        match family {
            IpFamily::V4 => self.incoming_v4 = mode,
            IpFamily::V6 => self.incoming_v6 = mode,
        }
        self
    }

    /// Incoming mode for `family`
    #[must_use]
    pub fn incoming(&self, family: IpFamily) -> IncomingMode {
        match family {
            IpFamily::V4 => self.incoming_v4,
            IpFamily::V6 => self.incoming_v6,
        }
    }
}

impl HubContext for HubSettings {
    fn hub_url(&self) -> &str {
        &self.url
    }

    fn hub_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }

    fn is_actively_reachable(&self, family: IpFamily) -> bool {
        self.incoming(family).is_active()
    }

    fn incoming_connections_disabled(&self, family: IpFamily) -> bool {
        self.incoming(family) == IncomingMode::Disabled
    }
}
