//! Error types for the settop runtime.

use settop_protocol::ErrorCode;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the settop runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// Engine executable was not found in any known layout.
	#[error("engine executable not found. Set SETTOP_ENGINE_EXE or build the settop-engine binary")]
	EngineNotFound,

	/// Failed to spawn the engine process.
	#[error("failed to launch engine process: {0}")]
	LaunchFailed(String),

	/// Pipe connect attempts were exhausted.
	#[error("failed to connect to engine pipe after {attempts} attempts")]
	ConnectFailed { attempts: u32 },

	/// A command requiring a live connection was issued without one.
	///
	/// This is a programming error on the caller's side, not a transient
	/// condition: silently dropping the command would surface as
	/// unexplained inactivity.
	#[error("no engine pipe connection; open a session first")]
	NotConnected,

	/// No qualifying event arrived within the startup window after `open`.
	#[error("no ready/navigated event within {timeout_ms}ms of open")]
	StartupTimeout { timeout_ms: u64 },

	/// The engine reported a fault while the open was in flight.
	#[error("engine reported {code} during open: {message}")]
	OpenFailed { code: ErrorCode, message: String },

	/// The pipe connection went away mid-operation.
	#[error("engine pipe closed unexpectedly")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
