//! The seam between command dispatch and the embedded view.
//!
//! Window management and the platform webview are external collaborators;
//! dispatch only ever talks to them through [`EngineView`], and the view
//! reports completed navigations and page messages back through
//! [`ViewEvents`]. All trait methods are invoked from the single task that
//! owns the view - never from the pipe read loop.

use serde_json::Value;
use settop_protocol::{ErrorCode, Event, NavCmd};
use thiserror::Error;
use tokio::sync::mpsc;

/// Everything a view needs to bind and present one session.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
	/// URL to navigate to once the view is bound.
	pub url: String,
	/// Isolated storage partition directory for this session. Already
	/// created; credentials of different services never share one.
	pub partition_dir: std::path::PathBuf,
	/// Optional user-agent override.
	pub user_agent: Option<String>,
	/// Borderless-maximized presentation.
	pub fullscreen: bool,
	/// Display the window should be restricted to.
	pub display: Option<String>,
}

/// Failures a view reports to dispatch; each maps to the stage code the
/// shell sees on the wire.
#[derive(Debug, Error)]
pub enum ViewError {
	/// Binding the view to its partition failed.
	#[error("view initialization failed: {0}")]
	Init(String),

	/// Navigation failed.
	#[error("navigation failed: {0}")]
	Navigate(String),

	/// Script execution failed.
	#[error("script execution failed: {0}")]
	Script(String),

	/// Posting a message into the page failed.
	#[error("message post failed: {0}")]
	Post(String),
}

impl ViewError {
	pub fn code(&self) -> ErrorCode {
		match self {
			ViewError::Init(_) => ErrorCode::Open,
			ViewError::Navigate(_) => ErrorCode::Nav,
			ViewError::Script(_) => ErrorCode::Exec,
			ViewError::Post(_) => ErrorCode::Post,
		}
	}
}

/// Handle a view uses to emit events toward the shell. Clone-cheap; events
/// are queued to the single pipe writer task.
#[derive(Clone)]
pub struct ViewEvents {
	tx: mpsc::UnboundedSender<Event>,
}

impl ViewEvents {
	pub(crate) fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
		Self { tx }
	}

	/// A navigation completed.
	pub fn navigated(&self, url: impl Into<String>) {
		let _ = self.tx.send(Event::Navigated { url: url.into() });
	}

	/// The loaded page posted a message out.
	pub fn media_state(&self, payload: Value) {
		let _ = self.tx.send(Event::MediaStateChanged { payload });
	}

	/// A recoverable fault, tagged with its stage.
	pub fn error(&self, code: ErrorCode, message: impl Into<String>) {
		let _ = self.tx.send(Event::Error { message: message.into(), code });
	}
}

/// The embedded view, owned by its own task (the UI-thread analog).
pub trait EngineView: Send + 'static {
	/// Binds the view to the session's partition, applies presentation
	/// options, and starts navigating to the requested URL. Implementations
	/// bind with the default context menu and developer tools disabled;
	/// this window only ever shows a playback page. Completed navigations
	/// are reported via `events`, including later in-page ones.
	fn open(&mut self, request: ViewRequest, events: ViewEvents) -> Result<(), ViewError>;

	/// History navigation. `back`/`forward` with no corresponding entry are
	/// no-ops; `reload` always succeeds once a page is loaded.
	fn history(&mut self, cmd: NavCmd);

	/// Runs a script in the loaded page context.
	fn exec(&mut self, code: &str) -> Result<(), ViewError>;

	/// Posts a structured message into the loaded page.
	fn post_message(&mut self, payload: &Value) -> Result<(), ViewError>;

	/// Repositions/resizes the host window. Best-effort.
	fn set_bounds(&mut self, x: i32, y: i32, width: u32, height: u32);

	/// Closes the window. Idempotent.
	fn close(&mut self);
}
