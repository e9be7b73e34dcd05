//! Error taxonomy shared by every component in the crate.
//!
//! Transport and protocol failures surface as [`Error::Channel`] and are
//! caught by a single failure boundary at every public command entry
//! point. State-invariant misses (queue edits on an empty queue, transport
//! commands while stopped) are deliberately *not* errors: they degrade to
//! silent no-ops at the command gate.

use thiserror::Error;

#[derive(Clone, Error, Debug)]
pub enum Error {
    /// A transport or protocol failure reported by the receiver channel:
    /// timeout, malformed response, connection reset. Treated as evidence
    /// that the connection is no longer trustworthy.
    #[error("channel error: {0}")]
    Channel(String),

    /// The receiver rejected an operation that is invalid in its current
    /// state. Benign for queue queries issued while no media is loaded.
    #[error("operation invalid in current state: {0}")]
    InvalidState(String),

    /// The connection to the receiver has been lost.
    #[error("receiver disconnected")]
    Disconnected,

    /// The session has already been torn down.
    #[error("session disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, Error>;
