//! PanelCore: single-owner event loop for the panel state.
//!
//! Four interval tasks (refresh, rotation, now-playing poll, offline retry)
//! and every in-flight data source call post `PanelEvent`s into one mpsc
//! channel.  PanelCore owns the `Reconciler` exclusively and folds events one
//! at a time, so a tick can never observe a half-applied result.
//!
//! Data source calls run in their own tasks; their results are ordinary
//! events.  After each fold that changes visible state the snapshot is
//! published to the `SnapshotStore` and `BroadcastMessage::StateUpdated` goes
//! out to all listeners.

use std::sync::Arc;
use std::time::Duration;

use jellypanel_proto::config::{Config, IntervalsConfig};
use jellypanel_proto::model::{MediaItem, PlaybackSession};
use jellypanel_proto::protocol::{Command, NowPlayingRequest, RecentlyAddedRequest};
use jellypanel_proto::state::SnapshotStore;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::reconciler::{Fold, Reconciler};
use crate::source::{DataSource, FetchError};
use crate::BroadcastMessage;

// ── PanelEvent ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Refresh,
    Rotation,
    NowPlayingPoll,
    OfflineRetry,
}

/// All inputs into the PanelCore loop.
#[derive(Debug)]
pub enum PanelEvent {
    Tick(TimerKind),
    RecentlyAdded(Result<Vec<MediaItem>, FetchError>),
    NowPlaying(Result<Option<PlaybackSession>, FetchError>),
    /// A command from a socket client or the HTTP API.
    ClientCommand(Command),
    Shutdown,
}

// ── PanelCore ─────────────────────────────────────────────────────────────────

pub struct PanelCore {
    reconciler: Reconciler,
    source: Arc<dyn DataSource>,
    snapshots: Arc<SnapshotStore>,
    recently_added: RecentlyAddedRequest,
    now_playing: NowPlayingRequest,
    intervals: IntervalsConfig,
    /// Loop-back for timers and fetch tasks.
    event_tx: mpsc::Sender<PanelEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    timers: Vec<JoinHandle<()>>,
    /// Outstanding recently-added requests.  Manual refreshes are dropped
    /// while any is pending.
    recently_added_in_flight: usize,
}

impl PanelCore {
    /// Fails on a config `Config::validate` rejects (a zero interval would
    /// otherwise kill its timer task).
    pub fn new(
        config: &Config,
        source: Arc<dyn DataSource>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<PanelEvent>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            reconciler: Reconciler::new(),
            source,
            snapshots: Arc::new(SnapshotStore::new()),
            recently_added: config.jellyfin.recently_added_request(),
            now_playing: config.jellyfin.now_playing_request(),
            intervals: config.intervals.clone(),
            event_tx,
            broadcast_tx,
            timers: Vec::new(),
            recently_added_in_flight: 0,
        })
    }

    /// Read side for the HTTP and socket servers.
    pub fn snapshot_store(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.snapshots)
    }

    /// Run until a `Shutdown` event arrives or every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<PanelEvent>) -> anyhow::Result<()> {
        info!("PanelCore: starting event loop");

        self.snapshots.publish(self.reconciler.view().clone()).await;

        // Refresh and now-playing fire at startup; rotation and retry wait a
        // full period.
        self.spawn_timer(TimerKind::Refresh, self.intervals.update(), true);
        self.spawn_timer(TimerKind::NowPlayingPoll, self.intervals.now_playing(), true);
        self.spawn_timer(TimerKind::Rotation, self.intervals.rotate(), false);
        self.spawn_timer(TimerKind::OfflineRetry, self.intervals.retry(), false);

        loop {
            match event_rx.recv().await {
                None => {
                    info!("PanelCore: event channel closed, shutting down");
                    break;
                }

                Some(PanelEvent::Shutdown) => {
                    info!("PanelCore: shutdown requested");
                    break;
                }

                Some(PanelEvent::Tick(kind)) => self.handle_tick(kind).await,

                Some(PanelEvent::RecentlyAdded(result)) => {
                    self.recently_added_in_flight = self.recently_added_in_flight.saturating_sub(1);
                    let fold = match result {
                        Ok(items) => {
                            debug!("PanelCore: {} recently added items", items.len());
                            self.reconciler.fold_recently_added(items)
                        }
                        Err(e) => {
                            warn!("PanelCore: recently added fetch failed: {}", e);
                            self.reconciler.fold_failure()
                        }
                    };
                    self.apply(fold).await;
                }

                Some(PanelEvent::NowPlaying(result)) => {
                    let fold = match result {
                        Ok(session) => self.reconciler.fold_now_playing(session),
                        Err(e) => {
                            warn!("PanelCore: now playing poll failed: {}", e);
                            self.reconciler.fold_failure()
                        }
                    };
                    self.apply(fold).await;
                }

                Some(PanelEvent::ClientCommand(cmd)) => {
                    info!("PanelCore: command {:?}", cmd);
                    self.handle_command(cmd);
                }
            }
        }

        for timer in self.timers.drain(..) {
            timer.abort();
        }
        Ok(())
    }

    async fn handle_tick(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Refresh => {
                if self.reconciler.should_refresh() {
                    self.spawn_recently_added();
                }
            }
            TimerKind::NowPlayingPoll => {
                if self.reconciler.should_poll_now_playing() {
                    self.spawn_now_playing();
                }
            }
            TimerKind::OfflineRetry => {
                if self.reconciler.should_retry() {
                    info!("PanelCore: retrying media server");
                    self.spawn_recently_added();
                }
            }
            TimerKind::Rotation => {
                let fold = self.reconciler.rotate();
                self.apply(fold).await;
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Refresh => {
                if self.recently_added_in_flight > 0 {
                    debug!("PanelCore: refresh ignored, request already in flight");
                } else if self.reconciler.should_refresh() {
                    self.spawn_recently_added();
                } else {
                    debug!("PanelCore: refresh ignored in {:?}", self.reconciler.view().mode);
                }
            }
            // Answered by the socket task from the snapshot store.
            Command::GetState => {}
        }
    }

    async fn apply(&mut self, fold: Fold) {
        if fold.emit {
            let view = self.reconciler.view().clone();
            debug!("PanelCore: emit rev={} mode={:?}", view.rev, view.mode);
            self.snapshots.publish(view).await;
            let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        }
        if fold.refresh {
            self.spawn_recently_added();
        }
    }

    // ── tasks ─────────────────────────────────────────────────────────────────

    fn spawn_timer(&mut self, kind: TimerKind, period: Duration, immediate: bool) {
        let tx = self.event_tx.clone();
        let start = if immediate {
            Instant::now()
        } else {
            Instant::now() + period
        };
        debug!("PanelCore: {:?} timer every {:?}", kind, period);
        self.timers.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(PanelEvent::Tick(kind)).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn spawn_recently_added(&mut self) {
        self.recently_added_in_flight += 1;
        let source = Arc::clone(&self.source);
        let request = self.recently_added.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = source.fetch_recently_added(&request).await;
            let _ = tx.send(PanelEvent::RecentlyAdded(result)).await;
        });
    }

    fn spawn_now_playing(&self) {
        let source = Arc::clone(&self.source);
        let request = self.now_playing.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = source.fetch_now_playing(&request).await;
            let _ = tx.send(PanelEvent::NowPlaying(result)).await;
        });
    }
}
