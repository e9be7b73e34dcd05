//! Per-session configuration injected at construction time.

use std::net::SocketAddr;

use uuid::Uuid;

/// Application identifier of the platform's default idle/backdrop
/// application. A receiver showing this application counts as free for
/// auto-launch purposes.
pub const DEFAULT_IDLE_APP_ID: &str = "E8C28D3C";

/// Number of one-second ticks between forced full status polls.
pub const DEFAULT_REFRESH_TICKS: u32 = 10;

/// Identity of the controlled receiver plus the session's tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Stable identifier of the physical receiver.
    pub receiver_id: Uuid,

    /// Friendly name, used in notifications and progress reports.
    pub receiver_name: String,

    /// Network endpoint the channel connects to.
    pub endpoint: SocketAddr,

    /// Application to launch on the receiver for playback.
    pub app_id: String,

    /// Application identifier considered "nothing is playing". Injected so
    /// the launch gate stays free of platform literals.
    pub idle_app_id: String,

    /// Forced status poll cadence, in ticks of the one-second clock.
    pub refresh_ticks: u32,
}

impl SessionConfig {
    #[must_use]
    pub fn new(
        receiver_id: Uuid,
        receiver_name: impl Into<String>,
        endpoint: SocketAddr,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            receiver_id,
            receiver_name: receiver_name.into(),
            endpoint,
            app_id: app_id.into(),
            idle_app_id: DEFAULT_IDLE_APP_ID.to_owned(),
            refresh_ticks: DEFAULT_REFRESH_TICKS,
        }
    }
}
