//! Peers and the CID-keyed peer registry
//!
//! A [`Peer`] is the hub-independent side of a remote user: its CID, a few
//! coarse flags and the number of bytes queued for download from it. The
//! same `Arc<Peer>` is shared by every hub session the user appears in and
//! by anything that keeps referring to the user while it is offline.

use crate::cid::Cid;
use dashmap::DashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Peer flag set
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PeerFlags(u32);

impl PeerFlags {
    /// Currently online in at least one hub
    pub const ONLINE: Self = Self(1 << 0);
    /// Uses the legacy NMDC protocol
    pub const LEGACY: Self = Self(1 << 1);
    /// Declared itself passive (legacy protocol)
    pub const PASSIVE: Self = Self(1 << 2);
    /// Automated client
    pub const BOT: Self = Self(1 << 3);
    /// Supports encrypted client connections
    pub const TLS: Self = Self(1 << 4);
    /// Supports NAT traversal
    pub const NAT_TRAVERSAL: Self = Self(1 << 5);
    /// Marked as favorite
    pub const FAVORITE: Self = Self(1 << 6);
    /// Ignored by the local user
    pub const IGNORED: Self = Self(1 << 7);
    /// The local user itself
    pub const LOCAL: Self = Self(1 << 8);

    /// Empty set
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if every flag in `other` is set
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PeerFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PeerFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PeerFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PeerFlags, &str); 9] = [
            (PeerFlags::ONLINE, "ONLINE"),
            (PeerFlags::LEGACY, "LEGACY"),
            (PeerFlags::PASSIVE, "PASSIVE"),
            (PeerFlags::BOT, "BOT"),
            (PeerFlags::TLS, "TLS"),
            (PeerFlags::NAT_TRAVERSAL, "NAT_TRAVERSAL"),
            (PeerFlags::FAVORITE, "FAVORITE"),
            (PeerFlags::IGNORED, "IGNORED"),
            (PeerFlags::LOCAL, "LOCAL"),
        ];

        let mut set = f.debug_set();
        for (flag, name) in NAMES {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}

/// A remote (or the local) participant, keyed by CID
pub struct Peer {
    cid: Cid,
    flags: AtomicU32,
    queued: AtomicI64,
}

impl Peer {
    /// Create a peer with no flags set
    #[must_use]
    pub fn new(cid: Cid) -> Self {
        Self::with_flags(cid, PeerFlags::empty())
    }

    /// Create a peer with an initial flag set
    #[must_use]
    pub fn with_flags(cid: Cid, flags: PeerFlags) -> Self {
        Self {
            cid,
            flags: AtomicU32::new(flags.bits()),
            queued: AtomicI64::new(0),
        }
    }

    /// Peer CID
    #[must_use]
    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    /// Current flag set
    #[must_use]
    pub fn flags(&self) -> PeerFlags {
        PeerFlags(self.flags.load(Ordering::Acquire))
    }

    /// True if every flag in `flags` is set
    #[must_use]
    pub fn is_set(&self, flags: PeerFlags) -> bool {
        self.flags().contains(flags)
    }

    /// Set flags
    pub fn set_flag(&self, flags: PeerFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Clear flags
    pub fn unset_flag(&self, flags: PeerFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Set or clear flags depending on `enabled`
    pub fn set_flag_to(&self, flags: PeerFlags, enabled: bool) {
        if enabled {
            self.set_flag(flags);
        } else {
            self.unset_flag(flags);
        }
    }

    /// Uses the legacy NMDC protocol
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.is_set(PeerFlags::LEGACY)
    }

    /// The local user's own peer
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.is_set(PeerFlags::LOCAL)
    }

    /// Bytes queued for download from this peer
    #[must_use]
    pub fn queued(&self) -> i64 {
        self.queued.load(Ordering::Acquire)
    }

    /// Account for newly queued bytes
    ///
    /// # Panics
    ///
    /// Panics if a negative amount drives the counter below zero.
    pub fn add_queued(&self, bytes: i64) {
        let previous = self.queued.fetch_add(bytes, Ordering::AcqRel);
        assert!(
            previous + bytes >= 0,
            "queued byte counter for {} went negative ({} + {})",
            self.cid,
            previous,
            bytes
        );
    }

    /// Account for bytes leaving the queue
    ///
    /// # Panics
    ///
    /// Panics if the counter would drop below zero. That can only happen when
    /// the queue bookkeeping upstream is broken.
    pub fn remove_queued(&self, bytes: i64) {
        let previous = self.queued.fetch_sub(bytes, Ordering::AcqRel);
        assert!(
            previous - bytes >= 0,
            "queued byte counter for {} went negative ({} - {})",
            self.cid,
            previous,
            bytes
        );
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("cid", &self.cid)
            .field("flags", &self.flags())
            .field("queued", &self.queued())
            .finish()
    }
}

/// Process-wide set of known peers, keyed by CID
///
/// Owns the local user's peer and hands out shared references to remote
/// peers so that every hub sees the same `Arc<Peer>` for a given CID.
pub struct PeerRegistry {
    local: Arc<Peer>,
    peers: DashMap<Cid, Arc<Peer>>,
}

impl PeerRegistry {
    /// Create a registry for a local user identified by `local_cid`
    #[must_use]
    pub fn new(local_cid: Cid) -> Self {
        let local = Arc::new(Peer::with_flags(local_cid, PeerFlags::LOCAL));
        let peers = DashMap::new();
        peers.insert(local_cid, Arc::clone(&local));
        Self { local, peers }
    }

    /// The local user's peer
    #[must_use]
    pub fn local(&self) -> &Arc<Peer> {
        &self.local
    }

    /// Look up a peer by CID
    #[must_use]
    pub fn get(&self, cid: &Cid) -> Option<Arc<Peer>> {
        self.peers.get(cid).map(|entry| Arc::clone(entry.value()))
    }

    /// Return the peer for `cid`, creating it on first sight
    pub fn get_or_insert(&self, cid: Cid) -> Arc<Peer> {
        let entry = self
            .peers
            .entry(cid)
            .or_insert_with(|| Arc::new(Peer::new(cid)));
        Arc::clone(entry.value())
    }

    /// Number of known peers, the local one included
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True when only the local peer is known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.len() <= 1
    }

    /// Drop peers that nothing outside the registry references any more
    ///
    /// Returns the number of peers removed. The local peer is never removed.
    pub fn prune(&self) -> usize {
        let before = self.peers.len();
        self.peers
            .retain(|cid, peer| *cid == *self.local.cid() || Arc::strong_count(peer) > 1);
        let removed = before - self.peers.len();
        if removed > 0 {
            tracing::debug!("Pruned {} unreferenced peers", removed);
        }
        removed
    }
}
