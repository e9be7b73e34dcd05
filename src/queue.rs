//! The local queue projection and its chunked receiver round-trips.
//!
//! The receiver caps every queue call at [`MAX_BATCH`] items, so bulk
//! fetches and loads are split into ceil(n / 20) calls. A projection is
//! all-or-nothing: a chunk fetch coming back empty empties the whole
//! projection rather than leaving it partially populated.

use crate::{
    channel::ReceiverChannel,
    error::Result,
    protocol::{
        media::{MediaInformation, RepeatMode},
        queue::{QueueItem, MAX_BATCH},
    },
};

/// Fetches the full authoritative queue from the receiver: the identifier
/// list first, then item payloads in chunks of [`MAX_BATCH`]. The result
/// is sorted by reported order position and renumbered densely.
pub async fn fetch(channel: &dyn ReceiverChannel) -> Result<Vec<QueueItem>> {
    let item_ids = channel.queue_item_ids().await?;
    let mut items = Vec::with_capacity(item_ids.len());

    for chunk in item_ids.chunks(MAX_BATCH) {
        let batch = channel.queue_items(chunk).await?;
        if batch.is_empty() {
            warn!("queue item fetch returned no data, dropping projection");
            return Ok(Vec::new());
        }
        items.extend(batch);
    }

    items.sort_by_key(|item| item.order);
    for (index, item) in items.iter_mut().enumerate() {
        item.order = index;
    }

    Ok(items)
}

/// Bulk-loads a queue onto the receiver: the first chunk replaces the
/// queue with repeat-all mode, the remaining chunks are appended.
pub async fn load(channel: &dyn ReceiverChannel, items: &[MediaInformation]) -> Result<()> {
    let mut chunks = items.chunks(MAX_BATCH);

    if let Some(first) = chunks.next() {
        channel.queue_load(RepeatMode::All, first).await?;
    }
    for chunk in chunks {
        channel.queue_insert(chunk, None).await?;
    }

    Ok(())
}

/// Bulk-inserts items before the given position, preserving order across
/// chunks by advancing the insertion point.
pub async fn insert(
    channel: &dyn ReceiverChannel,
    items: &[MediaInformation],
    before_index: Option<usize>,
) -> Result<()> {
    for (chunk_index, chunk) in items.chunks(MAX_BATCH).enumerate() {
        let before = before_index.map(|index| index + chunk_index * MAX_BATCH);
        channel.queue_insert(chunk, before).await?;
    }
    Ok(())
}

/// Direction of a local reorder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Shift {
    Up,
    Down,
}

/// Computes the complete identifier order after moving the given items one
/// step up or down. Items already at the boundary, or blocked by another
/// moved item, stay put. The receiver only accepts full reorders, so the
/// entire order is returned for resubmission.
#[must_use]
pub fn shifted_order(queue: &[QueueItem], moved: &[u64], shift: Shift) -> Vec<u64> {
    let mut sorted: Vec<&QueueItem> = queue.iter().collect();
    sorted.sort_by_key(|item| item.order);
    let mut order: Vec<u64> = sorted.into_iter().map(|item| item.item_id).collect();

    match shift {
        Shift::Up => {
            for index in 1..order.len() {
                if moved.contains(&order[index]) && !moved.contains(&order[index - 1]) {
                    order.swap(index - 1, index);
                }
            }
        }
        Shift::Down => {
            for index in (0..order.len().saturating_sub(1)).rev() {
                if moved.contains(&order[index]) && !moved.contains(&order[index + 1]) {
                    order.swap(index, index + 1);
                }
            }
        }
    }

    order
}
