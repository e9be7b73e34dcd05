//! Typed views of the receiver's push-status protocol.
//!
//! These are the shapes this crate consumes and produces at its seams; the
//! actual wire encoding lives in whatever [`crate::channel::ReceiverChannel`]
//! implementation is plugged in.

pub mod media;
pub mod queue;
pub mod receiver;
