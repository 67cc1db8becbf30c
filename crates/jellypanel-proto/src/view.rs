//! Render model: what a display shows for a given `ViewState`.
//!
//! Every fallback for a missing field lives here so that all consumers (the
//! HTTP panel endpoint, socket clients, log output) agree on what an absent
//! rating or overview looks like.  Markup and styling are left to the
//! consumer.

use crate::model::{MediaItem, PlaybackSession};
use crate::state::{DisplayMode, ViewState};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

pub const LOADING_TEXT: &str = "Loading content...";
pub const UNTITLED: &str = "Untitled";
pub const NO_OVERVIEW: &str = "No description available.";
pub const NO_RATING: &str = "No Rating";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_QUALITY: &str = "Unknown Quality";
pub const DEFAULT_HEADER: &str = "Jellyfin";

/// A panel plus the header line shown above it.  `header` is `None` when the
/// configured title is blank or the panel is hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelDocument {
    pub header: Option<String>,
    pub panel: PanelView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelView {
    /// Offline: render nothing.
    Hidden,
    Message { text: String },
    NowPlaying(NowPlayingPanel),
    Featured(FeaturedPanel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingPanel {
    pub title: String,
    pub poster: Option<String>,
    /// "Playing" or "Paused".
    pub state_label: String,
    pub progress_percent: f64,
    pub remaining_minutes: Option<i64>,
    pub rating_label: Option<String>,
    pub is_audio: bool,
    /// Only set for audio.
    pub album: Option<String>,
    /// Only set for audio.
    pub artist: Option<String>,
    /// Video quality, "Unknown Quality" when not reported.  Not set for audio.
    pub quality_label: Option<String>,
    pub audio_codec: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedPanel {
    pub title: String,
    pub poster: Option<String>,
    pub rating_label: String,
    pub content_rating: Option<String>,
    pub year: Option<i32>,
    pub overview: String,
    /// 1-based position in the rotation.
    pub position: usize,
    pub total: usize,
}

pub fn render(state: &ViewState) -> PanelView {
    match state.mode {
        DisplayMode::Offline => PanelView::Hidden,
        DisplayMode::Loading => PanelView::Message {
            text: LOADING_TEXT.to_string(),
        },
        DisplayMode::NowPlaying => match &state.now_playing {
            Some(session) => PanelView::NowPlaying(now_playing_panel(session)),
            None => PanelView::Hidden,
        },
        DisplayMode::RecentlyAddedRotation => match state.current_item() {
            Some(item) => PanelView::Featured(featured_panel(item, state.cursor, state.items.len())),
            None => PanelView::Message {
                text: LOADING_TEXT.to_string(),
            },
        },
    }
}

/// Render with the configured panel title as header.
pub fn render_document(state: &ViewState, title: &str) -> PanelDocument {
    let title = title.trim();
    let panel = render(state);
    let shown = !title.is_empty() && panel != PanelView::Hidden;
    PanelDocument {
        header: shown.then(|| title.to_string()),
        panel,
    }
}

fn display_title(item: &MediaItem) -> String {
    let t = item.title.trim();
    if t.is_empty() {
        UNTITLED.to_string()
    } else {
        t.to_string()
    }
}

fn rating_label(item: &MediaItem) -> Option<String> {
    item.community_rating
        .filter(|r| *r > 0.0)
        .map(|r| format!("IMDB: {}/10", r))
}

fn now_playing_panel(session: &PlaybackSession) -> NowPlayingPanel {
    let item = &session.item;
    let is_audio = item.is_audio();
    NowPlayingPanel {
        title: display_title(item),
        poster: item.poster_ref.clone(),
        state_label: if session.is_paused { "Paused" } else { "Playing" }.to_string(),
        progress_percent: session.progress() * 100.0,
        remaining_minutes: session.remaining_minutes(),
        rating_label: rating_label(item),
        is_audio,
        album: is_audio.then(|| {
            item.album
                .clone()
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
        }),
        artist: is_audio.then(|| {
            item.artist
                .clone()
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
        }),
        quality_label: (!is_audio).then(|| {
            item.video_quality
                .clone()
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_QUALITY.to_string())
        }),
        audio_codec: session.audio_codec.clone(),
    }
}

fn featured_panel(item: &MediaItem, cursor: usize, total: usize) -> FeaturedPanel {
    FeaturedPanel {
        title: display_title(item),
        poster: item.poster_ref.clone(),
        rating_label: rating_label(item).unwrap_or_else(|| NO_RATING.to_string()),
        content_rating: item.content_rating.clone().filter(|r| !r.is_empty()),
        year: item.premiere_date.map(|d| d.year()),
        overview: item
            .overview
            .clone()
            .filter(|o| !o.trim().is_empty())
            .unwrap_or_else(|| NO_OVERVIEW.to_string()),
        position: cursor + 1,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TICKS_PER_MINUTE;
    use crate::state::Connectivity;
    use chrono::NaiveDate;

    fn rotation(items: Vec<MediaItem>, cursor: usize) -> ViewState {
        ViewState {
            mode: DisplayMode::RecentlyAddedRotation,
            items,
            cursor,
            ..Default::default()
        }
    }

    #[test]
    fn test_offline_is_hidden() {
        let state = ViewState {
            mode: DisplayMode::Offline,
            connectivity: Connectivity::Offline,
            ..Default::default()
        };
        assert_eq!(render(&state), PanelView::Hidden);
    }

    #[test]
    fn test_loading_message() {
        match render(&ViewState::default()) {
            PanelView::Message { text } => assert_eq!(text, LOADING_TEXT),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_featured_fallbacks() {
        let state = rotation(vec![MediaItem::new("a", ""), MediaItem::new("b", "B")], 0);
        let PanelView::Featured(p) = render(&state) else {
            panic!("expected featured");
        };
        assert_eq!(p.title, UNTITLED);
        assert_eq!(p.rating_label, NO_RATING);
        assert_eq!(p.overview, NO_OVERVIEW);
        assert_eq!(p.poster, None);
        assert_eq!(p.year, None);
        assert_eq!((p.position, p.total), (1, 2));
    }

    #[test]
    fn test_featured_fields() {
        let item = MediaItem {
            community_rating: Some(7.5),
            premiere_date: NaiveDate::from_ymd_opt(1995, 12, 15),
            overview: Some("A heist.".into()),
            content_rating: Some("R".into()),
            ..MediaItem::new("h", "Heat")
        };
        let state = rotation(vec![MediaItem::new("a", "A"), item], 1);
        let PanelView::Featured(p) = render(&state) else {
            panic!("expected featured");
        };
        assert_eq!(p.title, "Heat");
        assert_eq!(p.rating_label, "IMDB: 7.5/10");
        assert_eq!(p.year, Some(1995));
        assert_eq!(p.content_rating.as_deref(), Some("R"));
        assert_eq!(p.position, 2);
    }

    #[test]
    fn test_now_playing_audio_fallbacks() {
        let item = MediaItem {
            item_type: Some("Audio".into()),
            runtime_ticks: Some(4 * TICKS_PER_MINUTE),
            ..MediaItem::new("t", "Song")
        };
        let state = ViewState {
            mode: DisplayMode::NowPlaying,
            now_playing: Some(PlaybackSession::new(item, TICKS_PER_MINUTE, true)),
            ..Default::default()
        };
        let PanelView::NowPlaying(p) = render(&state) else {
            panic!("expected now playing");
        };
        assert!(p.is_audio);
        assert_eq!(p.state_label, "Paused");
        assert_eq!(p.album.as_deref(), Some(UNKNOWN_ALBUM));
        assert_eq!(p.artist.as_deref(), Some(UNKNOWN_ARTIST));
        assert_eq!(p.remaining_minutes, Some(3));
        assert!((p.progress_percent - 25.0).abs() < 1e-9);
        assert!(p.quality_label.is_none());
    }

    #[test]
    fn test_now_playing_negative_runtime_never_goes_negative() {
        let item = MediaItem {
            runtime_ticks: Some(-5 * TICKS_PER_MINUTE),
            ..MediaItem::new("m", "Broken")
        };
        let state = ViewState {
            mode: DisplayMode::NowPlaying,
            now_playing: Some(PlaybackSession::new(item, 0, false)),
            ..Default::default()
        };
        let PanelView::NowPlaying(p) = render(&state) else {
            panic!("expected now playing");
        };
        assert_eq!(p.remaining_minutes, Some(0));
        assert_eq!(p.progress_percent, 0.0);
    }

    #[test]
    fn test_now_playing_quality_and_codec() {
        let item = MediaItem {
            video_quality: Some("4K".into()),
            ..MediaItem::new("m", "Heat")
        };
        let session = PlaybackSession::new(item, 0, false).with_audio_codec(Some("truehd".into()));
        let state = ViewState {
            mode: DisplayMode::NowPlaying,
            now_playing: Some(session),
            ..Default::default()
        };
        let PanelView::NowPlaying(p) = render(&state) else {
            panic!("expected now playing");
        };
        assert_eq!(p.quality_label.as_deref(), Some("4K"));
        assert_eq!(p.audio_codec.as_deref(), Some("truehd"));
    }

    #[test]
    fn test_document_header() {
        let doc = render_document(&ViewState::default(), DEFAULT_HEADER);
        assert_eq!(doc.header.as_deref(), Some("Jellyfin"));
        assert!(matches!(doc.panel, PanelView::Message { .. }));
        assert!(render_document(&ViewState::default(), "  ").header.is_none());

        let offline = ViewState {
            mode: DisplayMode::Offline,
            connectivity: Connectivity::Offline,
            ..Default::default()
        };
        assert!(render_document(&offline, DEFAULT_HEADER).header.is_none());
    }

    #[test]
    fn test_now_playing_video_has_no_album_line() {
        let state = ViewState {
            mode: DisplayMode::NowPlaying,
            now_playing: Some(PlaybackSession::new(MediaItem::new("m", "Heat"), 0, false)),
            ..Default::default()
        };
        let PanelView::NowPlaying(p) = render(&state) else {
            panic!("expected now playing");
        };
        assert_eq!(p.state_label, "Playing");
        assert!(p.album.is_none());
        assert!(p.remaining_minutes.is_none());
        assert_eq!(p.quality_label.as_deref(), Some(UNKNOWN_QUALITY));
        assert!(p.audio_codec.is_none());
        assert_eq!(p.progress_percent, 0.0);
    }
}
