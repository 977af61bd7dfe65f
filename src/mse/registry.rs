use crate::torrent::TorrentId;
use dashmap::DashMap;

/// Torrent lookup consulted when accepting an encrypted connection.
///
/// The receiver cannot see which torrent an initiator wants; it hashes each
/// known torrent id and compares. Only active torrents may be matched.
pub trait TorrentRegistry: Send + Sync {
    /// All torrent ids that could be requested.
    fn torrent_ids(&self) -> Vec<TorrentId>;

    /// Whether connections for `id` are currently accepted.
    fn is_active(&self, id: &TorrentId) -> bool;
}

/// A concurrent in-memory [`TorrentRegistry`].
#[derive(Debug, Default)]
pub struct ActiveTorrents {
    torrents: DashMap<TorrentId, bool>,
}

impl ActiveTorrents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` as active.
    pub fn insert(&self, id: TorrentId) {
        self.torrents.insert(id, true);
    }

    /// Pauses or resumes a known torrent. Returns false if `id` is unknown.
    pub fn set_active(&self, id: &TorrentId, active: bool) -> bool {
        match self.torrents.get_mut(id) {
            Some(mut entry) => {
                *entry = active;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &TorrentId) -> bool {
        self.torrents.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.torrents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.is_empty()
    }
}

impl TorrentRegistry for ActiveTorrents {
    fn torrent_ids(&self) -> Vec<TorrentId> {
        self.torrents.iter().map(|entry| *entry.key()).collect()
    }

    fn is_active(&self, id: &TorrentId) -> bool {
        self.torrents.get(id).map(|entry| *entry).unwrap_or(false)
    }
}
