//! The consumed receiver-channel capability.
//!
//! Implementations speak the actual vendor protocol; this crate only sees
//! typed commands and typed push events. All command futures resolve when
//! the receiver acknowledges, or fail with [`Error::Channel`] on transport
//! trouble and [`Error::InvalidState`] when the receiver rejects the
//! operation in its current state.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::Result,
    protocol::{
        media::{MediaInformation, MediaStatus, RepeatMode},
        queue::{QueueDelta, QueueItem, QueueUpdate},
        receiver::ReceiverStatus,
    },
};

/// An asynchronous, receiver-initiated push notification.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    /// Media status changed. `None` means the receiver reports no media at
    /// all.
    Media(Option<MediaStatus>),
    /// The receiver-side queue changed.
    Queue(QueueDelta),
    /// Receiver-level status changed (application, volume, mute).
    Receiver(ReceiverStatus),
    /// The connection was lost. Terminal; no further events follow.
    Disconnected,
}

/// Typed handle over an established protocol implementation.
///
/// Queue commands taking item slices are subject to the receiver's
/// [`MAX_BATCH`](crate::protocol::queue::MAX_BATCH) per-call ceiling;
/// callers chunk, implementations may reject oversized batches.
#[async_trait]
pub trait ReceiverChannel: Send + Sync + 'static {
    /// Connects to the receiver and returns the push-event stream. Called
    /// exactly once per session.
    async fn connect(&self) -> Result<mpsc::Receiver<ChannelEvent>>;

    /// Loads a single item, replacing whatever is playing.
    async fn load(&self, media: &MediaInformation) -> Result<()>;

    /// Replaces the receiver queue with the given items (≤ 20).
    async fn queue_load(&self, repeat_mode: RepeatMode, items: &[MediaInformation]) -> Result<()>;

    /// Inserts items (≤ 20), before the given 0-based position or at the
    /// end.
    async fn queue_insert(
        &self,
        items: &[MediaInformation],
        before_index: Option<usize>,
    ) -> Result<()>;

    async fn queue_remove(&self, item_ids: &[u64]) -> Result<()>;

    /// Reorders the queue to the given complete identifier order. The
    /// receiver does not support partial reorders.
    async fn queue_reorder(&self, item_ids: &[u64]) -> Result<()>;

    async fn queue_update(&self, update: &QueueUpdate) -> Result<()>;

    /// Full list of queue item identifiers, in queue order.
    async fn queue_item_ids(&self) -> Result<Vec<u64>>;

    /// Item payloads for the given identifiers (≤ 20).
    async fn queue_items(&self, item_ids: &[u64]) -> Result<Vec<QueueItem>>;

    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;

    /// Receiver-level stop; works even with no media loaded.
    async fn stop(&self) -> Result<()>;

    async fn seek(&self, position: u64) -> Result<()>;
    async fn next(&self) -> Result<()>;
    async fn previous(&self) -> Result<()>;
    async fn set_rate(&self, rate: f64) -> Result<()>;

    /// Launches an application on the receiver.
    async fn launch(&self, app_id: &str) -> Result<()>;

    async fn set_volume(&self, level: f32) -> Result<()>;
    async fn set_muted(&self, muted: bool) -> Result<()>;

    /// Forces a full status report; results arrive as push events.
    async fn refresh_status(&self) -> Result<()>;
}
