//! Media status snapshots pushed by the receiver.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Player state as classified from receiver media status.
///
/// Only [`Playing`](Self::Playing), [`Paused`](Self::Paused) and
/// [`Finished`](Self::Finished) drive session transitions; every other
/// value leaves the session uninitialized with the position clock stopped.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    #[default]
    Idle,
    Buffering,
    Loading,
    Playing,
    Paused,
    Finished,
}

impl PlayerState {
    /// Whether media is actively loaded and controllable (playing or
    /// paused, not stopped).
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Queue repeat mode, in the receiver's own vocabulary.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    #[serde(rename = "REPEAT_OFF")]
    Off,
    #[serde(rename = "REPEAT_ALL")]
    All,
    #[serde(rename = "REPEAT_SINGLE")]
    Single,
    #[serde(rename = "REPEAT_ALL_AND_SHUFFLE")]
    AllAndShuffle,
}

/// Opaque custom metadata carried alongside a playable item.
///
/// The progress service is keyed on `media_id` and `user_id`; items that
/// lack either are played but never reported.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

/// Description of a playable item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInformation {
    /// Receiver-resolvable content location or identifier.
    pub content_id: String,

    /// Duration in whole seconds. Often unknown until the receiver first
    /// reports playback status for the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,

    #[serde(default)]
    pub metadata: ItemMetadata,
}

/// A media status snapshot as pushed by the receiver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
    pub state: PlayerState,

    /// Playback position in whole seconds, when the receiver reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,

    /// Playback rate; `1.0` is normal speed.
    #[serde(default = "default_rate")]
    pub rate: f64,

    /// Queue item currently loaded, if the receiver is playing from its
    /// queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_item_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaInformation>,
}

fn default_rate() -> f64 {
    1.0
}

impl Default for MediaStatus {
    fn default() -> Self {
        Self {
            state: PlayerState::default(),
            position: None,
            rate: 1.0,
            current_item_id: None,
            media: None,
        }
    }
}

impl MediaStatus {
    /// The progress-service identifier embedded in the current media's
    /// custom metadata, if any.
    #[must_use]
    pub fn media_id(&self) -> Option<Uuid> {
        self.media.as_ref().and_then(|media| media.metadata.media_id)
    }

    /// The session-user identifier embedded in the current media's custom
    /// metadata, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.media.as_ref().and_then(|media| media.metadata.user_id)
    }
}
