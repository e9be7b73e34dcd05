//! Outbound capabilities: status broadcasting and progress reporting.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{error::Result, progress::ProgressReport, state::Session};

/// Fire-and-forget broadcast of session state to UI clients.
///
/// Implementations must not block; failures are theirs to swallow.
pub trait NotificationSink: Send + Sync + 'static {
    /// Pushes the current session snapshot.
    fn push_status(&self, receiver_name: &str, session: &Session);

    /// Pushes a human-readable error message.
    fn push_error(&self, receiver_name: &str, message: &str);
}

/// The external session-tracking service.
#[async_trait]
pub trait ProgressSink: Send + Sync + 'static {
    /// Reports playback progress for a logged-in user. `stopped` selects
    /// the service's stop/finish semantics over start/update.
    async fn report(
        &self,
        report: &ProgressReport,
        user_id: Uuid,
        receiver_name: &str,
        receiver_id: Uuid,
        stopped: bool,
    ) -> Result<()>;
}
