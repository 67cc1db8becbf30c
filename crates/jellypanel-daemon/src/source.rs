//! The data source seam: the two queries the reconciler needs from a media
//! server.  Implementations are stateless request/response adapters.
//!
//! "Nothing found" is a successful result (`Ok(vec![])` / `Ok(None)`);
//! `Err` always means the call itself could not complete.

use async_trait::async_trait;
use jellypanel_proto::model::{MediaItem, PlaybackSession};
use jellypanel_proto::protocol::{NowPlayingRequest, RecentlyAddedRequest};

/// Why a data source call failed.  The reconciler treats every variant the
/// same way; the detail is only logged.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to media server failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("media server returned HTTP {status}")]
    Status { status: u16 },
    #[error("could not decode media server response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Latest items, in server order.
    async fn fetch_recently_added(
        &self,
        request: &RecentlyAddedRequest,
    ) -> Result<Vec<MediaItem>, FetchError>;

    /// The active session for `request.user_id`, if any.
    async fn fetch_now_playing(
        &self,
        request: &NowPlayingRequest,
    ) -> Result<Option<PlaybackSession>, FetchError>;
}
