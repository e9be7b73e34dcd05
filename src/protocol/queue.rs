//! Queue items and the delta notifications the receiver pushes for them.
//!
//! The receiver never sends full queue snapshots. It assigns each item a
//! stable identifier on insertion and afterwards reports changes as
//! insert/update/remove deltas referencing those identifiers.

use serde::{Deserialize, Serialize};

use super::media::{MediaInformation, RepeatMode};

/// Hard per-call item ceiling of the receiver's queue commands. Both
/// outbound loads/inserts and item-payload fetches must be chunked to at
/// most this many items; larger batches are rejected.
pub const MAX_BATCH: usize = 20;

/// One entry of the receiver-side playback queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Receiver-assigned identifier, stable for the item's lifetime in the
    /// queue.
    pub item_id: u64,

    /// 0-based order position within the queue.
    pub order: usize,

    pub media: MediaInformation,
}

/// A queue change notification.
///
/// Deltas carry item identifiers only; resolving them against the local
/// projection (or refetching) is this crate's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "changeType", content = "itemIds")]
pub enum QueueDelta {
    /// Items were inserted. Positions are not derivable locally; the only
    /// safe reaction is a full refetch.
    Insert(Vec<u64>),
    /// Item order changed; the payload is the complete new identifier
    /// order.
    Update(Vec<u64>),
    /// The named items were removed.
    Remove(Vec<u64>),
}

/// Payload of the receiver's bulk queue-update command.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_item_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_mode: Option<RepeatMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<QueueItem>>,
}
