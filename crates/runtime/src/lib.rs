//! Runtime infrastructure for the settop control bridge.
//!
//! This crate provides the host side of the inter-process bridge to the
//! DRM-capable engine process:
//!
//! - **Transport**: line-delimited JSON framing over a duplex byte stream
//! - **Pipe**: the named local channel the bytes travel over
//! - **Engine supervision**: spawning and tearing down the engine process
//! - **Session bridge**: the at-most-one-session open state machine
//! - **Input injection**: remote gestures rendered as self-contained scripts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ settop-cli  │  Shell binary (remote wiring, presentation policy)
//! └──────┬──────┘
//! ┌──────▼──────────┐
//! │ settop-runtime  │  This crate
//! │  ┌───────────┐  │
//! │  │ Session   │  │  open/close state machine, startup race
//! │  └───────────┘  │
//! │  ┌───────────┐  │
//! │  │ Transport │  │  JSON-lines codec over the pipe
//! │  └───────────┘  │
//! │  ┌───────────┐  │
//! │  │ Engine    │  │  process supervision
//! │  └───────────┘  │
//! └─────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod input;
pub mod pipe;
pub mod session;
pub mod transport;

pub use engine::{EngineConfig, EngineSupervisor, resolve_engine_executable};
pub use error::{Error, Result};
pub use input::{Bounds, CursorState, DpadKey, InputInjector};
pub use session::{BridgeConfig, BridgeEvent, Session, SessionManager};
pub use transport::{LineReceiver, LineSender, LineTransport};
