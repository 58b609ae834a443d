//! The engine-process peer of the settop control bridge.
//!
//! This process exists because DRM-protected playback needs a browser
//! engine with native platform playback capability, which the shell's own
//! UI process does not have. The peer binds the named pipe, serves exactly
//! one shell connection for its lifetime, and dispatches decoded commands
//! onto the task that owns the embedded view.
//!
//! The view itself - window management and the platform webview - is an
//! external collaborator behind the [`EngineView`] trait. This crate ships
//! [`HeadlessView`], a diagnostic implementation used by integration tests
//! and by builds without a platform webview.

pub mod error;
pub mod headless;
pub mod partition;
pub mod serve;
pub mod view;

pub use error::{Error, Result};
pub use headless::HeadlessView;
pub use serve::{ServeConfig, serve};
pub use view::{EngineView, ViewError, ViewEvents, ViewRequest};
