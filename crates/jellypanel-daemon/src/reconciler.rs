//! Fold rules for the panel state machine.
//!
//! `Reconciler` owns the `ViewState` plus the last recently-added list it was
//! given (the cache survives a now-playing period so rotation can resume
//! without waiting for the next refresh).  Every method runs to completion
//! and returns a [`Fold`] telling the caller whether to publish the new
//! state and whether to issue an immediate recently-added refresh.
//!
//! Precedence is structural: a recently-added result never leaves
//! `NowPlaying`; only a `None` now-playing result or a failure does.

use jellypanel_proto::model::{MediaItem, PlaybackSession};
use jellypanel_proto::state::{Connectivity, DisplayMode, ViewState};
use tracing::{debug, info, warn};

/// What the caller has to do after a fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fold {
    /// Visible state changed; publish it (`rev` has been bumped).
    pub emit: bool,
    /// Issue a recently-added request now.
    pub refresh: bool,
}

impl Fold {
    fn emit(emit: bool) -> Self {
        Self {
            emit,
            refresh: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Reconciler {
    view: ViewState,
    cache: Vec<MediaItem>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Last recently-added list, including one received during playback.
    pub fn cached_items(&self) -> &[MediaItem] {
        &self.cache
    }

    // ── timer guards ──────────────────────────────────────────────────────────

    /// Refresh timer: not while a session is shown, and not while offline
    /// (recovery belongs to the retry timer).
    pub fn should_refresh(&self) -> bool {
        self.view.mode != DisplayMode::NowPlaying && self.view.connectivity == Connectivity::Online
    }

    pub fn should_poll_now_playing(&self) -> bool {
        self.view.connectivity != Connectivity::Offline
    }

    pub fn should_retry(&self) -> bool {
        self.view.connectivity == Connectivity::Offline
    }

    pub fn should_rotate(&self) -> bool {
        self.view.mode == DisplayMode::RecentlyAddedRotation && self.view.items.len() > 1
    }

    // ── folds ─────────────────────────────────────────────────────────────────

    /// Successful now-playing poll.
    pub fn fold_now_playing(&mut self, session: Option<PlaybackSession>) -> Fold {
        match session {
            Some(session) => self.session_active(session),
            None => self.session_ended(),
        }
    }

    fn session_active(&mut self, session: PlaybackSession) -> Fold {
        let before = self.view.clone();

        if let Some(prev) = &self.view.now_playing {
            if prev.id() != session.id() {
                info!("reconciler: session changed {} → {}", prev.id(), session.id());
            }
        }

        self.view.connectivity = Connectivity::Online;
        self.view.now_playing = Some(session);
        self.view.items.clear();
        self.view.cursor = 0;
        self.set_mode(DisplayMode::NowPlaying);

        Fold::emit(self.commit(&before))
    }

    fn session_ended(&mut self) -> Fold {
        if self.view.mode != DisplayMode::NowPlaying {
            return Fold::default();
        }
        let before = self.view.clone();

        self.view.connectivity = Connectivity::Online;
        self.view.now_playing = None;
        self.view.cursor = 0;
        if self.cache.is_empty() {
            self.view.items.clear();
            self.set_mode(DisplayMode::Loading);
        } else {
            self.view.items = self.cache.clone();
            self.set_mode(DisplayMode::RecentlyAddedRotation);
        }

        Fold {
            emit: self.commit(&before),
            refresh: true,
        }
    }

    /// Successful recently-added fetch (possibly empty).
    pub fn fold_recently_added(&mut self, items: Vec<MediaItem>) -> Fold {
        let before = self.view.clone();
        self.view.connectivity = Connectivity::Online;

        if items != self.cache {
            debug!("reconciler: recently added list changed ({} items)", items.len());
            self.cache = items;
            self.view.cursor = 0;
        }

        // Playback display wins; the list stays cached for later.
        if self.view.mode != DisplayMode::NowPlaying {
            if self.cache.is_empty() {
                self.view.items.clear();
                self.view.cursor = 0;
                self.set_mode(DisplayMode::Loading);
            } else {
                if self.view.mode != DisplayMode::RecentlyAddedRotation {
                    self.view.cursor = 0;
                }
                if self.view.items != self.cache {
                    self.view.items = self.cache.clone();
                }
                self.set_mode(DisplayMode::RecentlyAddedRotation);
            }
        }

        Fold::emit(self.commit(&before))
    }

    /// Any data source failure: hide everything.
    pub fn fold_failure(&mut self) -> Fold {
        let before = self.view.clone();

        self.view.connectivity = Connectivity::Offline;
        self.view.items.clear();
        self.view.cursor = 0;
        self.view.now_playing = None;
        self.cache.clear();
        self.set_mode(DisplayMode::Offline);

        Fold::emit(self.commit(&before))
    }

    /// Rotation timer tick.
    pub fn rotate(&mut self) -> Fold {
        if !self.should_rotate() {
            return Fold::default();
        }
        let before = self.view.clone();
        self.view.cursor = (self.view.cursor + 1) % self.view.items.len();
        Fold::emit(self.commit(&before))
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    fn set_mode(&mut self, mode: DisplayMode) {
        if self.view.mode != mode {
            match mode {
                DisplayMode::Offline => warn!("reconciler: media server unreachable, going offline"),
                _ => info!("reconciler: mode {:?} → {:?}", self.view.mode, mode),
            }
            self.view.mode = mode;
        }
    }

    /// Bump `rev` if anything visible changed since `before`.
    fn commit(&mut self, before: &ViewState) -> bool {
        debug_assert!(self.view.is_consistent(), "inconsistent view: {:?}", self.view);
        if self.view == *before {
            return false;
        }
        self.view.rev += 1;
        true
    }
}
