pub mod core;
pub mod http;
pub mod jellyfin;
pub mod reconciler;
pub mod socket;
pub mod source;

/// Fan-out from the core loop (and the log layer) to socket clients.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// A new snapshot has been published to the `SnapshotStore`.
    StateUpdated,
    Log(String),
}
