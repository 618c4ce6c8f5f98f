//! Connectivity scenarios
//!
//! A scenario file describes one hub, the local user and one remote peer as
//! they would look after the hub's INF broadcasts:
//!
//! ```toml
//! [hub]
//! url = "adc://hub.example.org:1511"
//! incoming_v4 = "passive"
//!
//! [me]
//! supports = "TCP4,UDP4"
//! attributes = { I4 = "198.51.100.1" }
//!
//! [peer]
//! supports = "ADC0,TCP4,NAT0"
//! attributes = { NI = "alice", I4 = "198.51.100.2" }
//! ```

use anyhow::Context;
use dclink_core::{
    AttrCode, Cid, ConnectMode, HubContext, HubSettings, HubUsers, Identity, IdentitySnapshot,
    OnlineUser, PeerFlags, PeerRegistry, ProfileSettings, Sid,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// One side of a scenario
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Side {
    /// Comma separated feature list
    pub supports: String,
    /// Attribute code to value
    pub attributes: BTreeMap<String, String>,
    /// Legacy (NMDC) peer
    pub legacy: bool,
    /// Legacy peer announced itself passive
    pub passive: bool,
}

/// Scenario file contents
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Hub the two users meet in
    pub hub: HubSettings,
    /// Local user
    #[serde(default)]
    pub me: Side,
    /// Remote peer
    #[serde(default)]
    pub peer: Side,
}

/// Outcome of resolving a scenario
#[derive(Debug, Serialize)]
pub struct Report {
    /// Hub address
    pub hub: String,
    /// TCP mode towards the peer
    pub tcp_mode: Option<ConnectMode>,
    /// UDP mode towards the peer
    pub udp_mode: Option<ConnectMode>,
    /// TCP mode permits IPv4
    pub tcp_allows_v4: bool,
    /// TCP mode permits IPv6
    pub tcp_allows_v6: bool,
    /// Either side can connect actively over TCP
    pub active_tcp: bool,
    /// Address a TCP connection would go to
    pub tcp_connect_ip: String,
    /// Address UDP datagrams would go to
    pub udp_ip: String,
    /// Local tag
    pub my_tag: String,
    /// Peer tag
    pub peer_tag: String,
    /// Full peer state
    pub peer: IdentitySnapshot,
}

impl Side {
    /// Attribute updates this side announces, with `SU` from `supports`
    fn updates(&self) -> anyhow::Result<Vec<(AttrCode, &str)>> {
        let mut updates = Vec::with_capacity(self.attributes.len() + 1);
        for (code, value) in &self.attributes {
            let code: AttrCode = code
                .parse()
                .with_context(|| format!("attribute {code:?} in scenario"))?;
            updates.push((code, value.as_str()));
        }
        if !self.supports.is_empty() {
            updates.push((AttrCode::SUPPORTS, self.supports.as_str()));
        }
        Ok(updates)
    }
}

fn apply_side(identity: &Identity, side: &Side) -> anyhow::Result<()> {
    for (code, value) in side.updates()? {
        identity.set(code, value);
    }
    identity.set_supports(&side.supports);
    Ok(())
}

impl Scenario {
    /// Load a scenario from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&contents)
    }

    /// Parse a scenario from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid scenario.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Build both users, resolve the peer's connectivity and report it
    ///
    /// The local profile is published first so the scenario's `me` section
    /// can override any of it.
    ///
    /// # Errors
    ///
    /// Returns an error if an attribute code in the scenario is invalid.
    pub fn resolve(&self, profile: &ProfileSettings) -> anyhow::Result<Report> {
        let registry = PeerRegistry::new(Cid::generate());
        let hub: Arc<dyn HubContext> = Arc::new(self.hub.clone());
        let users = HubUsers::new(Arc::clone(&hub));

        let me = Identity::new(Arc::clone(registry.local()), Sid::default());
        profile.apply_to(&me);
        apply_side(&me, &self.me)?;

        let peer = registry.get_or_insert(Cid::generate());
        peer.set_flag_to(PeerFlags::LEGACY, self.peer.legacy);
        peer.set_flag_to(PeerFlags::PASSIVE, self.peer.passive);
        let sid = Sid::from(1u16);
        let user: Arc<OnlineUser> = users.peer_joined(peer, sid);
        users.update_attributes(sid, self.peer.updates()?, &me);

        users.refresh_connect_modes(&me);

        let other = user.identity();
        let tcp_mode = other.tcp_connect_mode();
        Ok(Report {
            hub: user.hub_url(),
            tcp_mode,
            udp_mode: other.cached_udp_mode(),
            tcp_allows_v4: tcp_mode.is_some_and(ConnectMode::allows_v4),
            tcp_allows_v6: tcp_mode.is_some_and(ConnectMode::allows_v6),
            active_tcp: other.has_active_tcp_connectivity(Some(hub.as_ref())),
            tcp_connect_ip: other.tcp_connect_ip(),
            udp_ip: other.udp_ip(),
            my_tag: me.tag(),
            peer_tag: other.tag(),
            peer: other.snapshot(),
        })
    }
}

fn mode_text(mode: Option<ConnectMode>) -> String {
    mode.map_or_else(|| "unresolved".to_string(), |mode| mode.to_string())
}

impl Report {
    /// Human-readable summary
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Hub:            {}\n", self.hub));
        out.push_str(&format!("TCP mode:       {}\n", mode_text(self.tcp_mode)));
        out.push_str(&format!("UDP mode:       {}\n", mode_text(self.udp_mode)));
        out.push_str(&format!(
            "TCP families:   v4={} v6={}\n",
            self.tcp_allows_v4, self.tcp_allows_v6
        ));
        out.push_str(&format!("Active TCP:     {}\n", self.active_tcp));
        out.push_str(&format!("TCP address:    {}\n", self.tcp_connect_ip));
        out.push_str(&format!("UDP address:    {}\n", self.udp_ip));
        out.push_str(&format!("My tag:         {}\n", self.my_tag));
        out.push_str(&format!("Peer tag:       {}\n", self.peer_tag));
        out
    }
}
