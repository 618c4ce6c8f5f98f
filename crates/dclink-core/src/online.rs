//! Session users
//!
//! An [`OnlineUser`] is one peer as seen through one hub: it owns the
//! peer's [`Identity`] in that hub session and keeps a weak reference to the
//! hub it came from.

use crate::attr::AttrCode;
use crate::cid::Sid;
use crate::feature::Feature;
use crate::hub::HubContext;
use crate::identity::Identity;
use crate::mode::ConnectMode;
use crate::peer::Peer;
use crate::resolver;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};

/// A peer present in one hub
pub struct OnlineUser {
    identity: Identity,
    hub: Weak<dyn HubContext>,
}

impl OnlineUser {
    /// Create a session user for `peer` with session id `sid`
    #[must_use]
    pub fn new(peer: Arc<Peer>, hub: &Arc<dyn HubContext>, sid: Sid) -> Self {
        Self {
            identity: Identity::new(peer, sid),
            hub: Arc::downgrade(hub),
        }
    }

    /// The user's attributes in this hub
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The shared peer
    #[must_use]
    pub fn peer(&self) -> &Arc<Peer> {
        self.identity.peer()
    }

    /// Hub session id
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.identity.sid()
    }

    /// The hub, if it still exists
    #[must_use]
    pub fn hub(&self) -> Option<Arc<dyn HubContext>> {
        self.hub.upgrade()
    }

    /// Hub address, empty once the hub is gone
    #[must_use]
    pub fn hub_url(&self) -> String {
        self.hub()
            .map(|hub| hub.hub_url().to_string())
            .unwrap_or_default()
    }

    /// Hub display name, empty once the hub is gone
    #[must_use]
    pub fn hub_name(&self) -> String {
        self.hub()
            .map(|hub| hub.hub_name().to_string())
            .unwrap_or_default()
    }

    /// Supports client-to-client private messages
    #[must_use]
    pub fn supports_ccpm(&self) -> bool {
        self.identity.has_support(Feature::CCPM)
    }

    /// Current TCP connect mode
    #[must_use]
    pub fn tcp_connect_mode(&self) -> Option<ConnectMode> {
        self.identity.tcp_connect_mode()
    }

    /// Recompute the cached TCP and UDP modes relative to `me`
    ///
    /// Returns true if either mode changed. Returns false without touching
    /// the cache if the hub has already been dropped.
    pub fn update_connect_modes(&self, me: &Identity) -> bool {
        let Some(hub) = self.hub() else {
            tracing::debug!(
                "Hub of {} was dropped, skipping connect mode update",
                self.sid()
            );
            return false;
        };

        let old_tcp = self.identity.cached_tcp_mode();
        let old_udp = self.identity.cached_udp_mode();
        let changed = resolver::update_connect_modes(me, &self.identity, hub.as_ref());

        if changed {
            tracing::debug!(
                sid = %self.sid(),
                hub = hub.hub_url(),
                "Connect modes changed: TCP {:?} -> {:?}, UDP {:?} -> {:?}",
                old_tcp,
                self.identity.cached_tcp_mode(),
                old_udp,
                self.identity.cached_udp_mode()
            );
        }

        changed
    }

    /// Store one attribute update from the hub
    ///
    /// See [`OnlineUser::apply_attributes`].
    pub fn apply_attribute(&self, code: AttrCode, value: &str, me: &Identity) -> bool {
        self.apply_attributes([(code, value)], me)
    }

    /// Store a batch of attribute updates from the hub
    ///
    /// `SU` replaces the support list as well as the raw attribute. When any
    /// update touches a connectivity input the modes are recomputed once,
    /// after every value is stored. Returns true if either mode changed.
    pub fn apply_attributes<'a, I>(&self, updates: I, me: &Identity) -> bool
    where
        I: IntoIterator<Item = (AttrCode, &'a str)>,
    {
        let mut recompute = false;
        for (code, value) in updates {
            if code == AttrCode::SUPPORTS {
                self.identity.set_supports(value);
            }
            self.identity.set(code, value);
            recompute |= code.affects_connect_mode();
        }

        recompute && self.update_connect_modes(me)
    }

    /// Case-insensitive nick ordering for user lists
    #[must_use]
    pub fn cmp_by_nick(&self, other: &Self) -> Ordering {
        let left = self.identity.nick().to_lowercase();
        let right = other.identity.nick().to_lowercase();
        left.cmp(&right)
    }
}

impl fmt::Debug for OnlineUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnlineUser")
            .field("identity", &self.identity)
            .field("hub", &self.hub_url())
            .finish()
    }
}
