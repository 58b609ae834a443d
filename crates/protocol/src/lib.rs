//! Wire types for the settop control protocols.
//!
//! This crate contains the serde-serializable types exchanged between the
//! shell and its two out-of-process peers:
//!
//! - [`pipe`] - the command/event vocabulary carried over the engine pipe
//!   (one JSON object per line, newline-terminated)
//! - [`remote`] - the broadcast envelope carried over the remote control
//!   WebSocket channel
//!
//! Types here are pure data: no behavior beyond serialization and a few
//! defaulting accessors. Everything that interprets them lives in
//! `settop-runtime` and `settop-remote`.

pub mod pipe;
pub mod remote;

pub use pipe::*;
pub use remote::*;
