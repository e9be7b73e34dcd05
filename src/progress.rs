//! Mapping of player-state transitions onto external progress reports.
//!
//! Reporting requires the current media's custom metadata to carry both a
//! media identifier and a session-user identifier; absent either, nothing
//! is sent. The caller owns the `reported` flag on the session and commits
//! the [`Mirrored::active`] outcome after dispatching.

use serde::Serialize;
use uuid::Uuid;

use crate::{protocol::media::PlayerState, state::Session};

/// 100-nanosecond ticks per second, the progress service's position unit.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Play method reported for receiver-side playback.
pub const PLAY_METHOD: &str = "DirectStream";

/// Progress event kind. A report without an event signals stop/finish.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressEvent {
    /// First report of a progress session.
    Started,
    TimeUpdate,
    Pause,
}

/// One progress report, ready for the sink.
///
/// Stop and finish reports are trimmed: they carry only the media
/// identifier and position.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<ProgressEvent>,
    pub media_id: Uuid,
    pub position_ticks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_method: Option<&'static str>,
}

/// A computed report plus the sink arguments and the flag outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct Mirrored {
    pub report: ProgressReport,
    pub user_id: Uuid,
    /// Selects the sink's stop/finish semantics.
    pub stopped: bool,
    /// New value for the session's "progress session active" flag.
    pub active: bool,
}

fn identifiers(session: &Session) -> Option<(Uuid, Uuid)> {
    let status = session.media_status.as_ref()?;
    Some((status.media_id()?, status.user_id()?))
}

fn position_ticks(session: &Session) -> u64 {
    session.position.unwrap_or(0) * TICKS_PER_SECOND
}

/// Maps a classified player state to a report, if that state is reportable
/// for the current media.
#[must_use]
pub fn on_state(session: &Session, state: PlayerState) -> Option<Mirrored> {
    let (media_id, user_id) = identifiers(session)?;

    match state {
        PlayerState::Playing | PlayerState::Paused => {
            let paused = state == PlayerState::Paused;
            let event = if paused {
                ProgressEvent::Pause
            } else if session.reported {
                ProgressEvent::TimeUpdate
            } else {
                ProgressEvent::Started
            };

            Some(Mirrored {
                report: ProgressReport {
                    event: Some(event),
                    media_id,
                    position_ticks: position_ticks(session),
                    volume: session.volume.map(to_percent),
                    muted: session.muted,
                    paused: Some(paused),
                    rate: session.media_status.as_ref().map(|status| status.rate),
                    play_method: Some(PLAY_METHOD),
                },
                user_id,
                stopped: false,
                active: true,
            })
        }
        PlayerState::Finished => Some(Mirrored {
            report: finish_report(media_id, position_ticks(session)),
            user_id,
            stopped: true,
            active: false,
        }),
        _ => None,
    }
}

/// The explicit stop path, used on disconnect and on media-boundary
/// flushes. Only emits when a progress session is actually active.
#[must_use]
pub fn stop(session: &Session) -> Option<Mirrored> {
    if !session.reported {
        return None;
    }
    let (media_id, user_id) = identifiers(session)?;

    Some(Mirrored {
        report: finish_report(media_id, position_ticks(session)),
        user_id,
        stopped: true,
        active: false,
    })
}

fn finish_report(media_id: Uuid, position_ticks: u64) -> ProgressReport {
    ProgressReport {
        event: None,
        media_id,
        position_ticks,
        volume: None,
        muted: None,
        paused: None,
        rate: None,
        play_method: None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_percent(level: f32) -> u32 {
    (level.clamp(0.0, 1.0) * 100.0).round() as u32
}
