//! # dclink Core
//!
//! Peer identities and connectivity resolution for a Direct Connect hub
//! client.
//!
//! This crate provides:
//! - Identifiers (`Cid`, `Sid`) and two/four character protocol codes
//! - Shared peer records with atomic flags
//! - The per-session identity attribute store
//! - TCP/UDP connectivity mode resolution between the local user and a peer
//! - Session users and per-hub user lists with change notification
//! - Local profile settings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HubUsers                                 │
//! │   (SID-keyed session users of one hub, mode change events)      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                         OnlineUser                               │
//! │   (identity in one hub session + weak hub reference)            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                         Identity                                 │
//! │   (attribute map, supports, cached connect modes)               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                         Peer                                     │
//! │   (CID, atomic flags, queued bytes; shared across hubs)         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attr;
pub mod cid;
pub mod error;
pub mod events;
pub mod feature;
pub mod hub;
pub mod hub_users;
pub mod identity;
pub mod mode;
pub mod online;
pub mod peer;
pub mod resolver;
pub mod settings;
pub mod util;

pub use attr::AttrCode;
pub use cid::{Cid, Sid};
pub use error::{Error, Result};
pub use events::{Listeners, SubscriptionId};
pub use feature::Feature;
pub use hub::{HubContext, HubSettings, IncomingMode, IpFamily};
pub use hub_users::{ConnectModeChanged, HubUsers};
pub use identity::{ClientType, Identity, IdentitySnapshot};
pub use mode::{ConnectMode, allows_v4, allows_v6, is_active};
pub use online::OnlineUser;
pub use peer::{Peer, PeerFlags, PeerRegistry};
pub use resolver::{resolve, resolve_tcp, resolve_udp, update_connect_modes};
pub use settings::ProfileSettings;
