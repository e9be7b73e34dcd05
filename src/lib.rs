//! Per-receiver session state machines for cast-capable playback devices.
//!
//! A [`session::DeviceSession`] owns the authoritative in-process view of
//! what one receiver is doing: it supervises the connection, folds the
//! receiver's asynchronous push notifications into a coherent
//! [`state::Session`], mirrors the receiver's playback queue locally, and
//! forwards player-state transitions to an external progress service.
//!
//! The crate does not speak any wire protocol itself. It is handed a
//! [`channel::ReceiverChannel`] that already does, plus two outbound
//! capabilities: a [`sink::NotificationSink`] for broadcasting status to
//! UI clients and a [`sink::ProgressSink`] for playback reporting.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod channel;
pub mod config;
pub mod error;
pub mod progress;
pub mod protocol;
pub mod queue;
pub mod router;
pub mod session;
pub mod sink;
pub mod state;
