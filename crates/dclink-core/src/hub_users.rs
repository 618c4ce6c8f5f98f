//! Users of one hub
//!
//! [`HubUsers`] is the SID-keyed list a hub connection keeps of the peers it
//! has announced. It owns the session users and tells subscribers when
//! their connectivity changes.

use crate::attr::AttrCode;
use crate::cid::{Cid, Sid};
use crate::events::Listeners;
use crate::hub::HubContext;
use crate::identity::Identity;
use crate::mode::ConnectMode;
use crate::online::OnlineUser;
use crate::peer::Peer;
use dashmap::DashMap;
use std::sync::Arc;

/// A session user's cached connectivity changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectModeChanged {
    /// Hub session id of the user
    pub sid: Sid,
    /// The user's CID
    pub cid: Cid,
    /// New TCP mode
    pub tcp: Option<ConnectMode>,
    /// New UDP mode
    pub udp: Option<ConnectMode>,
}

/// Session users of one hub
pub struct HubUsers {
    hub: Arc<dyn HubContext>,
    users: DashMap<Sid, Arc<OnlineUser>>,
    mode_changes: Listeners<ConnectModeChanged>,
}

impl HubUsers {
    /// Empty user list for `hub`
    #[must_use]
    pub fn new(hub: Arc<dyn HubContext>) -> Self {
        Self {
            hub,
            users: DashMap::new(),
            mode_changes: Listeners::new(),
        }
    }

    /// The hub these users belong to
    #[must_use]
    pub fn hub(&self) -> &Arc<dyn HubContext> {
        &self.hub
    }

    /// Subscribers to connectivity changes
    #[must_use]
    pub fn mode_changes(&self) -> &Listeners<ConnectModeChanged> {
        &self.mode_changes
    }

    /// Register `peer` under `sid`, returning the session user
    ///
    /// A user already present under the same SID and CID is returned as is.
    /// A different CID under a known SID replaces the old user. A peer that
    /// rejoins under a new SID loses its old session user, so each peer has
    /// at most one user per hub.
    pub fn peer_joined(&self, peer: Arc<Peer>, sid: Sid) -> Arc<OnlineUser> {
        self.users.retain(|old_sid, existing| {
            if *old_sid == sid || existing.peer().cid() != peer.cid() {
                return true;
            }
            tracing::debug!(
                "{} moved from {} to {} in {}",
                peer.cid(),
                old_sid,
                sid,
                self.hub.hub_url()
            );
            false
        });

        self.users
            .entry(sid)
            .and_modify(|existing| {
                if existing.peer().cid() != peer.cid() {
                    tracing::debug!(
                        "SID {} reused in {}: {} replaces {}",
                        sid,
                        self.hub.hub_url(),
                        peer.cid(),
                        existing.peer().cid()
                    );
                    *existing = Arc::new(OnlineUser::new(Arc::clone(&peer), &self.hub, sid));
                }
            })
            .or_insert_with(|| {
                tracing::debug!("{} joined {} as {}", peer.cid(), self.hub.hub_url(), sid);
                Arc::new(OnlineUser::new(Arc::clone(&peer), &self.hub, sid))
            })
            .value()
            .clone()
    }

    /// Store attribute updates for the user under `sid`
    ///
    /// Connect modes are recomputed relative to `me` when a connectivity
    /// attribute is among the updates, and subscribers hear about a change
    /// after the user list is no longer borrowed. Returns true if a mode
    /// changed, false for an unknown SID.
    pub fn update_attributes<'a, I>(&self, sid: Sid, updates: I, me: &Identity) -> bool
    where
        I: IntoIterator<Item = (AttrCode, &'a str)>,
    {
        let Some(user) = self.get(sid) else {
            tracing::debug!("Attribute update for unknown SID {} in {}", sid, self.hub.hub_url());
            return false;
        };

        if !user.apply_attributes(updates, me) {
            return false;
        }
        self.mode_changes.emit(&mode_change(&user));
        true
    }

    /// Remove the user under `sid`
    pub fn peer_left(&self, sid: Sid) -> Option<Arc<OnlineUser>> {
        let (_, user) = self.users.remove(&sid)?;
        tracing::debug!(
            "{} ({}) left {}",
            user.identity().nick(),
            sid,
            self.hub.hub_url()
        );
        Some(user)
    }

    /// User under `sid`
    #[must_use]
    pub fn get(&self, sid: Sid) -> Option<Arc<OnlineUser>> {
        self.users.get(&sid).map(|entry| Arc::clone(entry.value()))
    }

    /// User whose peer has `cid`
    #[must_use]
    pub fn find_by_cid(&self, cid: &Cid) -> Option<Arc<OnlineUser>> {
        self.users
            .iter()
            .find(|entry| entry.value().peer().cid() == cid)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of users
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// No users
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// All users ordered by nick, ignoring case
    #[must_use]
    pub fn sorted_by_nick(&self) -> Vec<Arc<OnlineUser>> {
        let mut users: Vec<Arc<OnlineUser>> = self
            .users
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        users.sort_by(|a, b| a.cmp_by_nick(b));
        users
    }

    /// Drop every user, as on disconnect from the hub
    pub fn clear(&self) {
        let count = self.users.len();
        self.users.clear();
        tracing::debug!("Cleared {} users of {}", count, self.hub.hub_url());
    }

    /// Recompute every user's connectivity relative to `me`
    ///
    /// Subscribers are notified once per changed user after the whole list
    /// has been processed. Returns the number of changed users.
    pub fn refresh_connect_modes(&self, me: &Identity) -> usize {
        let users: Vec<Arc<OnlineUser>> = self
            .users
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let changes: Vec<ConnectModeChanged> = users
            .iter()
            .filter(|user| user.update_connect_modes(me))
            .map(|user| mode_change(user))
            .collect();

        for change in &changes {
            self.mode_changes.emit(change);
        }
        changes.len()
    }
}

fn mode_change(user: &OnlineUser) -> ConnectModeChanged {
    ConnectModeChanged {
        sid: user.sid(),
        cid: *user.peer().cid(),
        tcp: user.identity().cached_tcp_mode(),
        udp: user.identity().cached_udp_mode(),
    }
}

impl std::fmt::Debug for HubUsers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubUsers")
            .field("hub", &self.hub.hub_url())
            .field("users", &self.users.len())
            .finish()
    }
}
