#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jellypanel_daemon::core::{PanelCore, PanelEvent};
use jellypanel_daemon::source::{DataSource, FetchError};
use jellypanel_daemon::BroadcastMessage;
use jellypanel_proto::config::Config;
use jellypanel_proto::model::{MediaItem, PlaybackSession};
use jellypanel_proto::protocol::{NowPlayingRequest, RecentlyAddedRequest};
use jellypanel_proto::state::SnapshotStore;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Scriptable in-memory data source that counts calls.
#[derive(Default)]
pub struct FakeSource {
    items: Mutex<Vec<MediaItem>>,
    session: Mutex<Option<PlaybackSession>>,
    failing: AtomicBool,
    /// How long a recently-added call takes.
    latency: Mutex<Duration>,
    pub recently_added_calls: AtomicUsize,
    pub now_playing_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_items(ids: &[&str]) -> Arc<Self> {
        let source = Self::default();
        source.set_items(ids);
        Arc::new(source)
    }

    pub fn set_items(&self, ids: &[&str]) {
        *self.items.lock().unwrap() = items(ids);
    }

    pub fn set_session(&self, session: Option<PlaybackSession>) {
        *self.session.lock().unwrap() = session;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn recently_added(&self) -> usize {
        self.recently_added_calls.load(Ordering::SeqCst)
    }

    pub fn now_playing(&self) -> usize {
        self.now_playing_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for FakeSource {
    async fn fetch_recently_added(
        &self,
        _request: &RecentlyAddedRequest,
    ) -> Result<Vec<MediaItem>, FetchError> {
        self.recently_added_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Other("connection refused".into()));
        }
        Ok(self.items.lock().unwrap().clone())
    }

    async fn fetch_now_playing(
        &self,
        _request: &NowPlayingRequest,
    ) -> Result<Option<PlaybackSession>, FetchError> {
        self.now_playing_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status { status: 503 });
        }
        Ok(self.session.lock().unwrap().clone())
    }
}

pub fn items(ids: &[&str]) -> Vec<MediaItem> {
    ids.iter()
        .map(|id| MediaItem::new(*id, id.to_uppercase()))
        .collect()
}

pub fn session(id: &str, position: i64) -> PlaybackSession {
    let item = MediaItem {
        runtime_ticks: Some(10_000),
        ..MediaItem::new(id, id.to_uppercase())
    };
    PlaybackSession::new(item, position, false)
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.jellyfin.server_url = "http://jellyfin.test".into();
    config.jellyfin.user_id = "user-1".into();
    config
}

/// A running `PanelCore` wired to a fake source.
pub struct Harness {
    pub source: Arc<FakeSource>,
    pub snapshots: Arc<SnapshotStore>,
    pub events: mpsc::Sender<PanelEvent>,
    pub broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    pub fn start(source: Arc<FakeSource>) -> Self {
        Self::start_with(source, test_config())
    }

    pub fn start_with(source: Arc<FakeSource>, config: Config) -> Self {
        let (broadcast_tx, broadcast_rx) = broadcast::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let data_source: Arc<dyn DataSource> = source.clone();
        let core = PanelCore::new(&config, data_source, broadcast_tx, event_tx.clone()).unwrap();
        let snapshots = core.snapshot_store();
        let handle = tokio::spawn(core.run(event_rx));
        Self {
            source,
            snapshots,
            events: event_tx,
            broadcast_rx,
            handle,
        }
    }

    pub async fn shutdown(self) {
        self.events.send(PanelEvent::Shutdown).await.unwrap();
        self.handle.await.unwrap().unwrap();
    }
}
