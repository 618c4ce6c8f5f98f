//! Per-session identity attribute store
//!
//! An [`Identity`] holds everything a hub told us about one user in one hub
//! session: the two-character attribute map, the advertised feature list
//! and the cached TCP/UDP connectivity modes computed from them.
//!
//! # Locking
//!
//! Each identity has its own reader/writer lock. Readers (status display,
//! connectivity queries, derived accessors) share it, writers (`set`,
//! `set_supports`, mode cache updates) take it exclusively. The lock is held
//! only for the map operation itself; derived accessors read every attribute
//! they need under a single guard so they see one consistent state. No
//! collaborator is called while the lock is held.

use crate::attr::AttrCode;
use crate::cid::{Cid, Sid};
use crate::feature::Feature;
use crate::hub::{HubContext, IpFamily};
use crate::mode::ConnectMode;
use crate::peer::{Peer, PeerFlags};
use crate::util::{format_bytes, parse_leading_i64};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Client type bits advertised in the `CT` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientType(u32);

impl ClientType {
    /// Automated client
    pub const BOT: Self = Self(1);
    /// Registered user
    pub const REGISTERED: Self = Self(2);
    /// Operator
    pub const OPERATOR: Self = Self(4);
    /// Super user
    pub const SUPERUSER: Self = Self(8);
    /// Hub owner
    pub const OWNER: Self = Self(16);
    /// The hub itself
    pub const HUB: Self = Self(32);
    /// Hidden from user lists
    pub const HIDDEN: Self = Self(64);

    /// Raw bits
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

/// Serializable copy of an identity's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// Peer CID
    pub cid: Cid,
    /// Hub session id (text form)
    pub sid: String,
    /// Attribute code to value
    pub attributes: BTreeMap<String, String>,
    /// Advertised features
    pub supports: Vec<String>,
    /// Cached TCP connectivity mode
    pub tcp_mode: Option<ConnectMode>,
    /// Cached UDP connectivity mode
    pub udp_mode: Option<ConnectMode>,
}

#[derive(Debug, Default)]
struct IdentityState {
    info: HashMap<AttrCode, String>,
    supports: Vec<Feature>,
    tcp_mode: Option<ConnectMode>,
    udp_mode: Option<ConnectMode>,
}

impl IdentityState {
    fn get(&self, code: AttrCode) -> &str {
        self.info.get(&code).map_or("", String::as_str)
    }

    fn has(&self, code: AttrCode) -> bool {
        !self.get(code).is_empty()
    }

    fn has_support(&self, feature: Feature) -> bool {
        self.supports.contains(&feature)
    }

    fn is_tcp4_active(&self, peer: &Peer) -> bool {
        if peer.is_legacy() {
            !peer.is_set(PeerFlags::PASSIVE)
        } else {
            self.has(AttrCode::IP4) && self.has_support(Feature::TCP4)
        }
    }

    fn is_tcp6_active(&self) -> bool {
        self.has(AttrCode::IP6) && self.has_support(Feature::TCP6)
    }

    fn is_udp4_active(&self, peer: &Peer) -> bool {
        if !self.has(AttrCode::IP4) || !self.has(AttrCode::UDP4_PORT) {
            return false;
        }
        if peer.is_legacy() {
            !peer.is_set(PeerFlags::PASSIVE)
        } else {
            self.has_support(Feature::UDP4)
        }
    }

    fn is_udp6_active(&self, peer: &Peer) -> bool {
        if !self.has(AttrCode::IP6) || !self.has(AttrCode::UDP6_PORT) {
            return false;
        }
        !peer.is_legacy() && self.has_support(Feature::UDP6)
    }

    fn application(&self) -> String {
        let application = self.get(AttrCode::APPLICATION);
        let version = self.get(AttrCode::VERSION);

        if version.is_empty() {
            return application.to_string();
        }

        // AP is an extension the other side may not send, VE always works
        if application.is_empty() {
            return version.to_string();
        }

        format!("{application} {version}")
    }

    fn mode_char(&self, address: AttrCode, active: bool) -> char {
        match (self.has(address), active) {
            (false, _) => '-',
            (true, true) => 'A',
            (true, false) => 'P',
        }
    }

    fn tag(&self, peer: &Peer) -> String {
        let required = [
            AttrCode::VERSION,
            AttrCode::HUBS_NORMAL,
            AttrCode::HUBS_REGISTERED,
            AttrCode::HUBS_OPERATOR,
            AttrCode::SLOTS,
        ];
        if !required.iter().all(|code| self.has(*code)) {
            return String::new();
        }

        format!(
            "<{},M:{}{},H:{}/{}/{},S:{}>",
            self.application(),
            self.mode_char(AttrCode::IP4, self.is_tcp4_active(peer)),
            self.mode_char(AttrCode::IP6, self.is_tcp6_active()),
            self.get(AttrCode::HUBS_NORMAL),
            self.get(AttrCode::HUBS_REGISTERED),
            self.get(AttrCode::HUBS_OPERATOR),
            self.get(AttrCode::SLOTS),
        )
    }
}

/// Protocol attributes of one user in one hub session
pub struct Identity {
    peer: Arc<Peer>,
    sid: Sid,
    state: RwLock<IdentityState>,
}

impl Identity {
    /// Create an empty identity for `peer` in the session `sid`
    #[must_use]
    pub fn new(peer: Arc<Peer>, sid: Sid) -> Self {
        Self {
            peer,
            sid,
            state: RwLock::new(IdentityState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IdentityState> {
        self.state.read()
    }

    /// The peer this identity belongs to
    #[must_use]
    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    /// Hub session id
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.sid
    }

    /// True for the local user's own identity
    #[must_use]
    pub fn is_me(&self) -> bool {
        self.peer.is_local()
    }

    // ============ Attribute map ============

    /// Attribute value, empty if unset
    #[must_use]
    pub fn get(&self, code: AttrCode) -> String {
        self.read().get(code).to_string()
    }

    /// True if the attribute is present, whatever its value
    #[must_use]
    pub fn is_set(&self, code: AttrCode) -> bool {
        self.read().info.contains_key(&code)
    }

    /// Set an attribute; an empty value removes it
    pub fn set(&self, code: AttrCode, value: impl Into<String>) {
        let value = value.into();
        let mut state = self.state.write();
        if value.is_empty() {
            state.info.remove(&code);
        } else {
            state.info.insert(code, value);
        }
    }

    /// Copy of the whole attribute map, keyed by the two-character code
    #[must_use]
    pub fn info(&self) -> BTreeMap<String, String> {
        self.read()
            .info
            .iter()
            .map(|(code, value)| (code.to_string(), value.clone()))
            .collect()
    }

    // ============ Feature support ============

    /// Advertised features
    #[must_use]
    pub fn supports(&self) -> Vec<Feature> {
        self.read().supports.clone()
    }

    /// Replace the feature list from its comma separated wire form
    ///
    /// Tokens that are not four characters long are skipped.
    pub fn set_supports(&self, supports: &str) {
        let parsed: Vec<Feature> = supports
            .split(',')
            .filter(|token| !token.is_empty())
            .filter_map(|token| match token.parse() {
                Ok(feature) => Some(feature),
                Err(_) => {
                    tracing::trace!("Skipping malformed support token {:?}", token);
                    None
                }
            })
            .collect();

        self.state.write().supports = parsed;
    }

    /// True if `feature` is advertised
    #[must_use]
    pub fn has_support(&self, feature: Feature) -> bool {
        self.read().has_support(feature)
    }

    // ============ Plain accessors ============

    /// Nick
    #[must_use]
    pub fn nick(&self) -> String {
        self.get(AttrCode::NICK)
    }

    /// IPv4 address
    #[must_use]
    pub fn ip4(&self) -> String {
        self.get(AttrCode::IP4)
    }

    /// IPv6 address
    #[must_use]
    pub fn ip6(&self) -> String {
        self.get(AttrCode::IP6)
    }

    /// IPv4 UDP port
    #[must_use]
    pub fn udp4_port(&self) -> String {
        self.get(AttrCode::UDP4_PORT)
    }

    /// IPv6 UDP port
    #[must_use]
    pub fn udp6_port(&self) -> String {
        self.get(AttrCode::UDP6_PORT)
    }

    /// UDP port to use: the IPv6 one when an IPv6 address and port exist
    #[must_use]
    pub fn udp_port(&self) -> String {
        let state = self.read();
        if state.has(AttrCode::IP6) && state.has(AttrCode::UDP6_PORT) {
            state.get(AttrCode::UDP6_PORT).to_string()
        } else {
            state.get(AttrCode::UDP4_PORT).to_string()
        }
    }

    /// Upload slots, saturating at `u8::MAX`
    #[must_use]
    pub fn slots(&self) -> u8 {
        let slots = parse_leading_i64(&self.get(AttrCode::SLOTS)).max(0);
        u8::try_from(slots).unwrap_or(u8::MAX)
    }

    /// Advertised speed in bytes per second (`DS` when `download`, else `US`)
    #[must_use]
    pub fn connection_speed(&self, download: bool) -> i64 {
        let code = if download {
            AttrCode::DOWNLOAD_SPEED
        } else {
            AttrCode::UPLOAD_SPEED
        };
        parse_leading_i64(self.read().get(code))
    }

    /// Connection description shown in user lists
    ///
    /// Legacy peers carry a free-form `CO` string, ADC peers their upload
    /// speed.
    #[must_use]
    pub fn connection_string(&self) -> String {
        if self.peer.is_legacy() {
            self.get(AttrCode::CONNECTION)
        } else {
            self.connection_speed(false).to_string()
        }
    }

    /// Client type bitmask from `CT`
    #[must_use]
    pub fn client_type(&self) -> u32 {
        parse_leading_i64(self.read().get(AttrCode::CLIENT_TYPE)) as u32
    }

    /// True if every bit of `ct` is set in `CT`
    #[must_use]
    pub fn is_client_type(&self, ct: ClientType) -> bool {
        self.client_type() & ct.bits() == ct.bits()
    }

    /// `AP VE`, falling back to whichever of the two is present
    #[must_use]
    pub fn application(&self) -> String {
        self.read().application()
    }

    /// Legacy-style client tag, empty unless `VE HN HR HO SL` are all set
    #[must_use]
    pub fn tag(&self) -> String {
        self.read().tag(&self.peer)
    }

    /// Number of hubs the user is in, unparsable counts as zero
    #[must_use]
    pub fn total_hub_count(&self) -> i64 {
        let state = self.read();
        [
            AttrCode::HUBS_NORMAL,
            AttrCode::HUBS_REGISTERED,
            AttrCode::HUBS_OPERATOR,
        ]
        .iter()
        .map(|code| parse_leading_i64(state.get(*code)))
        .sum()
    }

    // ============ Activity predicates ============

    /// Accepts incoming TCP connections over IPv4
    ///
    /// For the local identity, passing the hub asks the hub connection
    /// itself instead of looking at the published attributes.
    #[must_use]
    pub fn is_tcp4_active(&self, hub: Option<&dyn HubContext>) -> bool {
        if !self.peer.is_legacy() && self.is_me() {
            if let Some(hub) = hub {
                return hub.is_actively_reachable(IpFamily::V4);
            }
        }
        self.read().is_tcp4_active(&self.peer)
    }

    /// Accepts incoming TCP connections over IPv6
    #[must_use]
    pub fn is_tcp6_active(&self) -> bool {
        self.read().is_tcp6_active()
    }

    /// Accepts UDP over IPv4
    #[must_use]
    pub fn is_udp4_active(&self) -> bool {
        self.read().is_udp4_active(&self.peer)
    }

    /// Accepts UDP over IPv6
    #[must_use]
    pub fn is_udp6_active(&self) -> bool {
        self.read().is_udp6_active(&self.peer)
    }

    // ============ Cached connectivity ============

    /// Last resolved TCP mode, `None` until resolved
    #[must_use]
    pub fn cached_tcp_mode(&self) -> Option<ConnectMode> {
        self.read().tcp_mode
    }

    /// Last resolved UDP mode, `None` until resolved
    #[must_use]
    pub fn cached_udp_mode(&self) -> Option<ConnectMode> {
        self.read().udp_mode
    }

    /// Store freshly resolved modes, returning true if either changed
    pub(crate) fn store_connect_modes(&self, tcp: ConnectMode, udp: ConnectMode) -> bool {
        let mut state = self.state.write();
        let changed = state.tcp_mode != Some(tcp) || state.udp_mode != Some(udp);
        state.tcp_mode = Some(tcp);
        state.udp_mode = Some(udp);
        changed
    }

    /// TCP mode used for connecting
    ///
    /// The local user is always [`ConnectMode::Me`]. Legacy peers have no
    /// resolution and are judged by their passive flag alone.
    #[must_use]
    pub fn tcp_connect_mode(&self) -> Option<ConnectMode> {
        if self.is_me() {
            return Some(ConnectMode::Me);
        }

        if self.peer.is_legacy() {
            return Some(if self.is_tcp4_active(None) {
                ConnectMode::ActiveV4
            } else {
                ConnectMode::PassiveV4
            });
        }

        self.cached_tcp_mode()
    }

    /// Either side can open a TCP connection actively
    #[must_use]
    pub fn has_active_tcp_connectivity(&self, hub: Option<&dyn HubContext>) -> bool {
        if self.peer.is_legacy() || self.is_me() {
            return self.is_tcp4_active(hub) || self.is_tcp6_active();
        }

        self.cached_tcp_mode().is_some_and(ConnectMode::is_active)
    }

    /// UDP datagrams can be sent to this user directly
    #[must_use]
    pub fn is_udp_active(&self) -> bool {
        if self.peer.is_legacy() {
            return self.is_udp4_active();
        }

        self.cached_udp_mode().is_some_and(ConnectMode::is_active)
    }

    /// Address to open a TCP connection to
    #[must_use]
    pub fn tcp_connect_ip(&self) -> String {
        let state = self.read();
        if self.peer.is_legacy() || !state.tcp_mode.is_some_and(ConnectMode::allows_v6) {
            state.get(AttrCode::IP4).to_string()
        } else {
            state.get(AttrCode::IP6).to_string()
        }
    }

    /// Address to send UDP datagrams to
    #[must_use]
    pub fn udp_ip(&self) -> String {
        let state = self.read();
        if self.peer.is_legacy() || !state.udp_mode.is_some_and(ConnectMode::allows_v6) {
            state.get(AttrCode::IP4).to_string()
        } else {
            state.get(AttrCode::IP6).to_string()
        }
    }

    // ============ Status surfaces ============

    /// Serializable copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> IdentitySnapshot {
        let state = self.read();
        IdentitySnapshot {
            cid: *self.peer.cid(),
            sid: self.sid.to_string(),
            attributes: state
                .info
                .iter()
                .map(|(code, value)| (code.to_string(), value.clone()))
                .collect(),
            supports: state.supports.iter().map(ToString::to_string).collect(),
            tcp_mode: state.tcp_mode,
            udp_mode: state.udp_mode,
        }
    }

    /// Flat parameter map for status lines and log path templates
    ///
    /// Every attribute is emitted as `<prefix><code>`, followed by derived
    /// values. With `compatibility`, the older unprefixed names are added as
    /// well (`mynick`/`mycid` when the prefix is `my`).
    #[must_use]
    pub fn params(&self, prefix: &str, compatibility: bool) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = self
            .info()
            .into_iter()
            .map(|(code, value)| (format!("{prefix}{code}"), value))
            .collect();

        let state = self.read();
        let cid = self.peer.cid().to_base32();
        let tag = state.tag(&self.peer);
        let share_short = format_bytes(parse_leading_i64(state.get(AttrCode::SHARE_SIZE)));
        let nick = state.get(AttrCode::NICK).to_string();

        params.insert(format!("{prefix}NI"), nick.clone());
        params.insert(format!("{prefix}SID"), self.sid.to_string());
        params.insert(format!("{prefix}CID"), cid.clone());
        params.insert(format!("{prefix}TAG"), tag.clone());
        params.insert(
            format!("{prefix}CO"),
            state.get(AttrCode::CONNECTION).to_string(),
        );
        params.insert(
            format!("{prefix}DS"),
            state.get(AttrCode::DOWNLOAD_SPEED).to_string(),
        );
        params.insert(format!("{prefix}SSshort"), share_short.clone());

        if compatibility {
            if prefix == "my" {
                params.insert("mynick".to_string(), nick);
                params.insert("mycid".to_string(), cid);
            } else {
                let real_share = format_bytes(parse_leading_i64(state.get(AttrCode::REAL_SHARE_SIZE)));
                params.insert("nick".to_string(), nick);
                params.insert("cid".to_string(), cid);
                params.insert("ip".to_string(), state.get(AttrCode::IP4).to_string());
                params.insert("tag".to_string(), tag);
                params.insert(
                    "description".to_string(),
                    state.get(AttrCode::DESCRIPTION).to_string(),
                );
                params.insert("email".to_string(), state.get(AttrCode::EMAIL).to_string());
                params.insert(
                    "share".to_string(),
                    state.get(AttrCode::SHARE_SIZE).to_string(),
                );
                params.insert("shareshort".to_string(), share_short);
                params.insert("realshareformat".to_string(), real_share);
            }
        }

        params
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("cid", self.peer.cid())
            .field("sid", &self.sid)
            .field("nick", &self.nick())
            .finish()
    }
}
