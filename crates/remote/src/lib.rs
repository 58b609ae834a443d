//! Remote control channel: broadcast hub and self-healing client.
//!
//! The hub is a small WebSocket server that echoes every control message to
//! all connected peers, decoupling "controller" and "display" roles: a
//! phone and the shell both just join the same channel. The client side
//! adds typed dispatch plus reconnection with exponential backoff and
//! address-strategy fallback.

pub mod client;
pub mod error;
pub mod server;

pub use client::{AddressStrategy, RemoteClient, RemoteClientState};
pub use error::{Error, Result};
pub use server::{RemoteServer, RemoteServerConfig};
