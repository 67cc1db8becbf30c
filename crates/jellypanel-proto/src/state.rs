use crate::model::{MediaItem, PlaybackSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Which panel the display should show.
///
/// Transitions (driven by the reconciler):
///   Loading -> RecentlyAddedRotation | NowPlaying | Offline
///   RecentlyAddedRotation <-> NowPlaying
///   any -> Offline -> Loading | RecentlyAddedRotation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Server unreachable; nothing is shown.
    Offline,
    /// No data yet (or an empty catalog).
    #[default]
    Loading,
    NowPlaying,
    RecentlyAddedRotation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Online,
    Offline,
}

/// Reconciled view of the panel.  `rev` is bumped on every emitted update so
/// consumers can detect missed snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ViewState {
    #[serde(default)]
    pub rev: u64,
    pub mode: DisplayMode,
    #[serde(default)]
    pub items: Vec<MediaItem>,
    #[serde(default)]
    pub cursor: usize,
    #[serde(default)]
    pub now_playing: Option<PlaybackSession>,
    pub connectivity: Connectivity,
}

impl ViewState {
    /// Item under the rotation cursor, only in rotation mode.
    pub fn current_item(&self) -> Option<&MediaItem> {
        if self.mode != DisplayMode::RecentlyAddedRotation {
            return None;
        }
        self.items.get(self.cursor)
    }

    /// Check the mode/content invariants.  Used by tests and debug asserts.
    pub fn is_consistent(&self) -> bool {
        let cursor_ok = self.items.is_empty() || self.cursor < self.items.len();
        let mode_ok = match self.mode {
            DisplayMode::NowPlaying => self.now_playing.is_some() && self.items.is_empty(),
            DisplayMode::RecentlyAddedRotation => {
                self.now_playing.is_none() && !self.items.is_empty()
            }
            DisplayMode::Offline => {
                self.connectivity == Connectivity::Offline
                    && self.items.is_empty()
                    && self.now_playing.is_none()
            }
            DisplayMode::Loading => self.now_playing.is_none() && self.items.is_empty(),
        };
        cursor_ok && mode_ok && (self.now_playing.is_some() == (self.mode == DisplayMode::NowPlaying))
    }
}

/// Latest published snapshot.  The reconciler loop is the only writer;
/// the HTTP and socket servers read.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    state: Arc<RwLock<ViewState>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_state(&self) -> ViewState {
        self.state.read().await.clone()
    }

    pub async fn publish(&self, state: ViewState) {
        *self.state.write().await = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_loading_online() {
        let s = ViewState::default();
        assert_eq!(s.mode, DisplayMode::Loading);
        assert_eq!(s.connectivity, Connectivity::Online);
        assert!(s.is_consistent());
        assert!(s.current_item().is_none());
    }

    #[test]
    fn test_rotation_without_items_is_inconsistent() {
        let s = ViewState {
            mode: DisplayMode::RecentlyAddedRotation,
            ..Default::default()
        };
        assert!(!s.is_consistent());
    }

    #[test]
    fn test_current_item_follows_cursor() {
        let s = ViewState {
            mode: DisplayMode::RecentlyAddedRotation,
            items: vec![MediaItem::new("a", "A"), MediaItem::new("b", "B")],
            cursor: 1,
            ..Default::default()
        };
        assert_eq!(s.current_item().map(|i| i.id.as_str()), Some("b"));
    }

    #[tokio::test]
    async fn test_snapshot_store_publish() {
        let store = SnapshotStore::new();
        let state = ViewState {
            rev: 7,
            mode: DisplayMode::Offline,
            connectivity: Connectivity::Offline,
            ..Default::default()
        };
        store.publish(state.clone()).await;
        assert_eq!(store.get_state().await, state);
    }
}
