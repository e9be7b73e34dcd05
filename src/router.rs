//! Translation of receiver push events into state transitions.
//!
//! The router is a synchronous reducer: it mutates the [`Session`] and
//! returns the side effects the owning actor must carry out, in order.
//! Keeping I/O out of here makes every transition testable as plain data.

use crate::{
    channel::ChannelEvent,
    progress::{self, Mirrored},
    protocol::{
        media::{MediaStatus, PlayerState},
        queue::QueueDelta,
        receiver::ReceiverStatus,
    },
    state::Session,
};

/// A side effect requested by a state transition, to be executed by the
/// session actor in the order returned.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Dispatch a progress report.
    Report(Mirrored),
    /// Broadcast the current session snapshot to the notification sink.
    PushStatus,
    /// The local queue projection is stale; refetch it from the receiver.
    ResyncQueue,
}

/// Routes one push event. [`ChannelEvent::Disconnected`] is not handled
/// here; it converges on the supervisor's teardown path instead.
pub fn route(session: &mut Session, event: ChannelEvent) -> Vec<Effect> {
    match event {
        ChannelEvent::Media(status) => on_media_status(session, status),
        ChannelEvent::Queue(delta) => on_queue_delta(session, &delta),
        ChannelEvent::Receiver(status) => on_receiver_status(session, status),
        ChannelEvent::Disconnected => Vec::new(),
    }
}

fn on_media_status(session: &mut Session, status: Option<MediaStatus>) -> Vec<Effect> {
    let mut effects = Vec::new();

    // A different media identifier (or no media at all) is a session
    // boundary: flush a final report for the old media before adopting
    // anything new. Computed pre-mutation so it carries the old position.
    if let Some(old_id) = session.tracked_media_id() {
        let new_id = status.as_ref().and_then(MediaStatus::media_id);
        if new_id != Some(old_id) {
            if let Some(mirrored) = progress::stop(session) {
                session.reported = mirrored.active;
                effects.push(Effect::Report(mirrored));
            }
        }
    }

    match status {
        None => {
            trace!("no media reported, clearing session");
            session.clear_media();
        }
        Some(status) => {
            let state = status.state;
            session.adopt_media(status);

            if state.is_active() {
                session.initialized = true;
                session.clock_running = true;
            } else {
                // Finished stays initialized solely to trigger the finish
                // report; everything else drops back to uninitialized.
                session.initialized = state == PlayerState::Finished;
                session.clock_running = false;
            }

            if let Some(mirrored) = progress::on_state(session, state) {
                session.reported = mirrored.active;
                effects.push(Effect::Report(mirrored));
            }
        }
    }

    effects.push(Effect::PushStatus);
    effects
}

fn on_queue_delta(session: &mut Session, delta: &QueueDelta) -> Vec<Effect> {
    match delta {
        // Insert positions are not locally derivable; discard the delta and
        // refetch the authoritative queue.
        QueueDelta::Insert(item_ids) => {
            debug!("{} item(s) inserted, resyncing queue", item_ids.len());
            vec![Effect::ResyncQueue]
        }
        QueueDelta::Update(item_ids) => {
            session.reorder_queue(item_ids);
            vec![Effect::PushStatus]
        }
        QueueDelta::Remove(item_ids) => {
            session.remove_queue_items(item_ids);
            vec![Effect::PushStatus]
        }
    }
}

fn on_receiver_status(session: &mut Session, status: ReceiverStatus) -> Vec<Effect> {
    session.application = status.application;
    if let Some(volume) = status.volume {
        session.volume = Some(volume);
    }
    if let Some(muted) = status.muted {
        session.muted = Some(muted);
    }
    vec![Effect::PushStatus]
}
