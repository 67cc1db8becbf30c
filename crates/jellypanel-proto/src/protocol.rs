use crate::state::ViewState;
use serde::{Deserialize, Serialize};

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way.  Clients check it in `Hello` and can refuse to talk to an
/// incompatible daemon.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound for one framed message; larger length headers are rejected
/// instead of buffered.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

// ── Data source requests ──────────────────────────────────────────────────────

/// "Latest items of a content type".  All fields are passed through to the
/// data source untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentlyAddedRequest {
    pub content_type: String,
    /// Library (parent folder) to restrict the listing to.
    #[serde(default)]
    pub library_scope: Option<String>,
    pub max_items: u32,
    #[serde(default)]
    pub sort_order: Option<String>,
}

/// "Currently playing session for a user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingRequest {
    pub user_id: String,
}

// ── Socket protocol ───────────────────────────────────────────────────────────

/// Messages sent from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Refresh the recently-added list now (same guards as the timer).
    Refresh,
    /// Ask for a full `State` snapshot.
    GetState,
}

/// Messages sent from the daemon to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Sent immediately on connect: protocol version + full snapshot.
    Hello {
        protocol_version: u32,
        rev: u64,
        state: ViewState,
    },
    State {
        data: ViewState,
    },
    Log {
        message: String,
    },
}

/// Wrapper for socket communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Broadcast(Broadcast),
}

impl Message {
    /// Frame as 4-byte big-endian length + JSON body.
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        if json.len() > MAX_FRAME_LEN {
            anyhow::bail!("Message too large: {} bytes", json.len());
        }
        let len = json.len() as u32;
        let mut result = Vec::with_capacity(4 + json.len());
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&json);
        Ok(result)
    }

    /// Decode one frame from the front of `data`.  Returns the message and
    /// the number of bytes consumed.  Errors when the frame is incomplete;
    /// callers distinguish that case with [`Message::frame_complete`].
    pub fn decode(data: &[u8]) -> anyhow::Result<(Self, usize)> {
        let Some(len) = frame_len(data) else {
            anyhow::bail!("Insufficient data for length header");
        };
        if len > MAX_FRAME_LEN {
            anyhow::bail!("Frame length {} exceeds limit", len);
        }
        if data.len() < 4 + len {
            anyhow::bail!("Insufficient data for message");
        }
        let msg: Self = serde_json::from_slice(&data[4..4 + len])?;
        Ok((msg, 4 + len))
    }

    /// True when `data` starts with a whole frame (or an oversized header,
    /// which `decode` will reject).
    pub fn frame_complete(data: &[u8]) -> bool {
        match frame_len(data) {
            Some(len) => len > MAX_FRAME_LEN || data.len() >= 4 + len,
            None => false,
        }
    }
}

fn frame_len(data: &[u8]) -> Option<usize> {
    if data.len() < 4 {
        return None;
    }
    Some(u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize)
}
