//! Receiver-level status: foreground application, volume and mute.

use serde::{Deserialize, Serialize};

/// The application currently foregrounded on the receiver.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    pub app_id: String,
    #[serde(default)]
    pub display_name: String,
}

/// A receiver-channel status snapshot.
///
/// This is the sole source of the "is some other application in control"
/// determination that gates auto-launching.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationInfo>,

    /// Volume level in `0.0..=1.0`, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}
