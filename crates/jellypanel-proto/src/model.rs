//! Catalog and playback records as the daemon sees them after the data
//! source has shaped the raw Jellyfin responses.
//!
//! Jellyfin measures runtime and position in ticks of 100 ns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TICKS_PER_SECOND: i64 = 10_000_000;
pub const TICKS_PER_MINUTE: i64 = 60 * TICKS_PER_SECOND;

/// Convert a tick count to a `Duration`.  Negative counts become zero.
pub fn ticks_to_duration(ticks: i64) -> Duration {
    let ticks = ticks.max(0) as u64;
    Duration::from_nanos(ticks.saturating_mul(100))
}

/// One catalog entry from a "recently added" listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_rating: Option<String>,
    #[serde(default)]
    pub premiere_date: Option<NaiveDate>,
    #[serde(default)]
    pub overview: Option<String>,
    /// Poster URL resolved by the data source.
    #[serde(default)]
    pub poster_ref: Option<String>,
    #[serde(default)]
    pub runtime_ticks: Option<i64>,
    /// Jellyfin item type (`Movie`, `Episode`, `Audio`, ...).
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub community_rating: Option<f32>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    /// Jellyfin's `VideoQuality` label, when the server reports one.
    #[serde(default)]
    pub video_quality: Option<String>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn is_audio(&self) -> bool {
        self.item_type.as_deref() == Some("Audio")
    }
}

/// The session currently playing for the configured user.
///
/// The position is clamped into `0..=runtime_ticks` when the session is built
/// (including deserialization) and again on every read, since `item` is
/// public and its runtime may be edited after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SessionRecord")]
pub struct PlaybackSession {
    #[serde(flatten)]
    pub item: MediaItem,
    position_ticks: i64,
    pub is_paused: bool,
    /// Codec of the audio stream being played (`PlayState.AudioCodec`).
    #[serde(default)]
    pub audio_codec: Option<String>,
}

#[derive(Deserialize)]
struct SessionRecord {
    #[serde(flatten)]
    item: MediaItem,
    #[serde(default)]
    position_ticks: i64,
    #[serde(default)]
    is_paused: bool,
    #[serde(default)]
    audio_codec: Option<String>,
}

impl From<SessionRecord> for PlaybackSession {
    fn from(r: SessionRecord) -> Self {
        Self::new(r.item, r.position_ticks, r.is_paused).with_audio_codec(r.audio_codec)
    }
}

impl PlaybackSession {
    pub fn new(item: MediaItem, position_ticks: i64, is_paused: bool) -> Self {
        let position_ticks = clamp_position(position_ticks, item.runtime_ticks);
        Self {
            item,
            position_ticks,
            is_paused,
            audio_codec: None,
        }
    }

    pub fn with_audio_codec(mut self, codec: Option<String>) -> Self {
        self.audio_codec = codec.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn id(&self) -> &str {
        &self.item.id
    }

    pub fn position_ticks(&self) -> i64 {
        clamp_position(self.position_ticks, self.item.runtime_ticks)
    }

    /// Fraction of the runtime already played, `0.0` when the runtime is
    /// unknown or zero.
    pub fn progress(&self) -> f64 {
        match self.item.runtime_ticks {
            Some(runtime) if runtime > 0 => self.position_ticks() as f64 / runtime as f64,
            _ => 0.0,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.item
            .runtime_ticks
            .map(|runtime| ticks_to_duration(runtime - self.position_ticks()))
    }

    /// Whole minutes left, rounded down from the exact remaining time.
    /// Never negative, even for a bogus negative runtime.
    pub fn remaining_minutes(&self) -> Option<i64> {
        self.remaining().map(|d| (d.as_secs() / 60) as i64)
    }
}

fn clamp_position(position: i64, runtime: Option<i64>) -> i64 {
    let position = position.max(0);
    match runtime {
        Some(runtime) => position.min(runtime.max(0)),
        None => position,
    }
}
