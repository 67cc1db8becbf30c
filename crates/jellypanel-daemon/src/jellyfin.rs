//! Jellyfin implementation of [`DataSource`].
//!
//! Two endpoints are used:
//!   - `GET /Users/{userId}/Items/Latest` for the recently-added listing
//!   - `GET /Sessions` for the now-playing session of the configured user
//!
//! Raw responses are reduced to [`MediaItem`] / [`PlaybackSession`] here:
//! PascalCase fields are renamed, poster URLs are resolved from image tags,
//! malformed entries (no `Id`) are dropped and duplicate ids are collapsed.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use jellypanel_proto::config::JellyfinConfig;
use jellypanel_proto::model::{MediaItem, PlaybackSession};
use jellypanel_proto::protocol::{NowPlayingRequest, RecentlyAddedRequest};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::source::{DataSource, FetchError};

const TOKEN_HEADER: &str = "X-Emby-Token";
const ITEM_FIELDS: &str = "Overview,MediaSourceCount,VideoQuality";
const IMAGE_TYPES: &str = "Primary,Thumb,Banner";

// ── Raw API shapes ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    official_rating: Option<String>,
    #[serde(default)]
    premiere_date: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    run_time_ticks: Option<i64>,
    #[serde(rename = "Type", default)]
    item_type: Option<String>,
    #[serde(default)]
    community_rating: Option<f32>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    album_artist: Option<String>,
    #[serde(default)]
    artists: Option<Vec<String>>,
    #[serde(default)]
    image_tags: Option<HashMap<String, String>>,
    #[serde(default)]
    video_quality: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSession {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    now_playing_item: Option<RawItem>,
    #[serde(default)]
    play_state: Option<RawPlayState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPlayState {
    #[serde(default)]
    position_ticks: Option<i64>,
    #[serde(default)]
    is_paused: Option<bool>,
    #[serde(default)]
    audio_codec: Option<String>,
}

// ── Source ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JellyfinSource {
    client: Client,
    base_url: String,
    /// `Items/Latest` is user-scoped; the listing is always done as the
    /// configured user.
    user_id: String,
}

impl JellyfinSource {
    pub fn new(config: &JellyfinConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let mut token = HeaderValue::from_str(config.api_key.trim())?;
            token.set_sensitive(true);
            headers.insert(TOKEN_HEADER, token);
        }

        let client = Client::builder()
            .user_agent(concat!("jellypanel/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            user_id: config.user_id.trim().to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("jellyfin: GET {}", url);
        let resp = self.client.get(&url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DataSource for JellyfinSource {
    async fn fetch_recently_added(
        &self,
        request: &RecentlyAddedRequest,
    ) -> Result<Vec<MediaItem>, FetchError> {
        if self.user_id.is_empty() {
            return Err(FetchError::Other("no user id configured".into()));
        }
        let path = format!("/Users/{}/Items/Latest", self.user_id);
        let raw: Vec<RawItem> = self.get_json(&path, &latest_query(request)).await?;
        let items = map_items(raw, &self.base_url);
        debug!("jellyfin: {} recently added items", items.len());
        Ok(items)
    }

    async fn fetch_now_playing(
        &self,
        request: &NowPlayingRequest,
    ) -> Result<Option<PlaybackSession>, FetchError> {
        let sessions: Vec<RawSession> = self.get_json("/Sessions", &[]).await?;
        Ok(select_session(sessions, &request.user_id, &self.base_url))
    }
}

fn latest_query(request: &RecentlyAddedRequest) -> Vec<(&'static str, String)> {
    let mut q = vec![
        ("IncludeItemTypes", request.content_type.clone()),
        ("Limit", request.max_items.to_string()),
        ("Fields", ITEM_FIELDS.to_string()),
        ("ImageTypeLimit", "1".to_string()),
        ("EnableImageTypes", IMAGE_TYPES.to_string()),
        ("EnableTotalRecordCount", "false".to_string()),
    ];
    if let Some(parent) = &request.library_scope {
        q.push(("ParentId", parent.clone()));
    }
    if let Some(order) = &request.sort_order {
        q.push(("SortOrder", order.clone()));
    }
    q
}

// ── Mapping ───────────────────────────────────────────────────────────────────

fn map_items(raw: Vec<RawItem>, base_url: &str) -> Vec<MediaItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(raw.len());
    for r in raw {
        let Some(item) = map_item(r, base_url) else {
            warn!("jellyfin: dropping item without Id");
            continue;
        };
        if !seen.insert(item.id.clone()) {
            debug!("jellyfin: dropping duplicate item {}", item.id);
            continue;
        }
        items.push(item);
    }
    items
}

fn map_item(raw: RawItem, base_url: &str) -> Option<MediaItem> {
    let id = raw.id.filter(|id| !id.trim().is_empty())?;
    let tags = raw.image_tags.unwrap_or_default();
    let poster_ref = if tags.contains_key("Primary") {
        Some(image_url(base_url, &id, "Primary"))
    } else if tags.contains_key("Thumb") {
        Some(image_url(base_url, &id, "Thumb"))
    } else {
        None
    };
    let artist = raw
        .album_artist
        .filter(|a| !a.is_empty())
        .or_else(|| raw.artists.and_then(|a| a.into_iter().find(|a| !a.is_empty())));

    Some(MediaItem {
        title: raw.name.unwrap_or_default(),
        content_rating: raw.official_rating.filter(|r| !r.is_empty()),
        premiere_date: raw.premiere_date.as_deref().and_then(parse_premiere_date),
        overview: raw.overview.filter(|o| !o.is_empty()),
        poster_ref,
        runtime_ticks: raw.run_time_ticks,
        item_type: raw.item_type,
        community_rating: raw.community_rating,
        album: raw.album.filter(|a| !a.is_empty()),
        artist,
        video_quality: raw.video_quality.filter(|q| !q.is_empty()),
        id,
    })
}

fn select_session(
    sessions: Vec<RawSession>,
    user_id: &str,
    base_url: &str,
) -> Option<PlaybackSession> {
    let wanted = normalize_id(user_id);
    let session = sessions.into_iter().find(|s| {
        s.now_playing_item.is_some()
            && s.user_id.as_deref().map(normalize_id).as_deref() == Some(wanted.as_str())
    })?;

    let play_state = session.play_state.unwrap_or_default();
    let item = map_item(session.now_playing_item?, base_url)?;

    Some(
        PlaybackSession::new(
            item,
            play_state.position_ticks.unwrap_or(0),
            play_state.is_paused.unwrap_or(false),
        )
        .with_audio_codec(play_state.audio_codec),
    )
}

fn image_url(base_url: &str, id: &str, kind: &str) -> String {
    format!("{}/Items/{}/Images/{}", base_url, id, kind)
}

/// Jellyfin ids are GUIDs that appear both dashed and undashed.
fn normalize_id(id: &str) -> String {
    id.trim()
        .chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_premiere_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    s.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}
