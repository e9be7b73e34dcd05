//! The in-memory session data model and its pure mutation helpers.
//!
//! Everything here is synchronous and side-effect free so that state
//! transitions stay testable without a runtime. The actor in
//! [`crate::session`] is the only writer.

use std::net::SocketAddr;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::SessionConfig,
    protocol::{media::MediaStatus, queue::QueueItem, receiver::ApplicationInfo},
};

/// Authoritative in-process state for one receiver.
///
/// Invariants upheld by every helper:
/// * `position` and `media_status` are both present or both absent;
/// * `queue` order is a dense `0..n` sequence after any reconciliation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub receiver_id: Uuid,
    pub receiver_name: String,
    pub endpoint: SocketAddr,

    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_status: Option<MediaStatus>,
    /// Locally clocked playback position in whole seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    pub queue: Vec<QueueItem>,

    /// Media has been adopted and classified as controllable.
    pub initialized: bool,
    /// A progress session has been reported as active upstream.
    #[serde(skip)]
    pub reported: bool,
    /// One-shot teardown guard.
    #[serde(skip)]
    pub disposed: bool,
    /// The local one-second position clock is running.
    #[serde(skip)]
    pub clock_running: bool,
}

impl Session {
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            receiver_id: config.receiver_id,
            receiver_name: config.receiver_name.clone(),
            endpoint: config.endpoint,
            connected: false,
            application: None,
            volume: None,
            muted: None,
            media_status: None,
            position: None,
            queue: Vec::new(),
            initialized: false,
            reported: false,
            disposed: false,
            clock_running: false,
        }
    }

    /// The identifier of the media the session currently tracks, if any.
    #[must_use]
    pub fn tracked_media_id(&self) -> Option<Uuid> {
        self.media_status.as_ref().and_then(MediaStatus::media_id)
    }

    /// Adopts a new media status: takes over the reported position (keeping
    /// the previous one when the receiver omits it) and back-fills the
    /// duration into the matching queue entry. Durations are never
    /// invented, only copied from what the receiver reports.
    pub fn adopt_media(&mut self, status: MediaStatus) {
        self.position = Some(status.position.or(self.position.take()).unwrap_or(0));

        if let (Some(item_id), Some(duration)) = (
            status.current_item_id,
            status.media.as_ref().and_then(|media| media.duration),
        ) {
            if let Some(entry) = self.queue.iter_mut().find(|entry| entry.item_id == item_id) {
                entry.media.duration = Some(duration);
            }
        }

        self.media_status = Some(status);
    }

    /// Clears all media-derived state. Idempotent; used both when the
    /// receiver reports no media and on teardown.
    pub fn clear_media(&mut self) {
        self.media_status = None;
        self.position = None;
        self.queue.clear();
        self.initialized = false;
        self.clock_running = false;
    }

    /// Removes the named items and renumbers the remainder densely from 0.
    pub fn remove_queue_items(&mut self, item_ids: &[u64]) {
        self.queue.retain(|entry| !item_ids.contains(&entry.item_id));
        self.renumber();
    }

    /// Re-sorts the queue to the receiver-reported identifier order and
    /// renumbers densely from 0. Identifiers the projection does not know
    /// keep their relative order at the end.
    pub fn reorder_queue(&mut self, item_ids: &[u64]) {
        self.queue.sort_by_key(|entry| {
            item_ids
                .iter()
                .position(|id| *id == entry.item_id)
                .unwrap_or(usize::MAX)
        });
        self.renumber();
    }

    /// Computes the post-teardown state: disconnected, no media, nothing
    /// initialized. The resource-release half lives in the actor.
    pub fn teardown(&mut self) {
        self.connected = false;
        self.application = None;
        self.clear_media();
    }

    fn renumber(&mut self) {
        for (index, entry) in self.queue.iter_mut().enumerate() {
            entry.order = index;
        }
    }
}
