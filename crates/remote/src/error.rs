//! Error types for the remote control channel.

use thiserror::Error;

/// Result type alias for remote channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on the remote control channel.
#[derive(Debug, Error)]
pub enum Error {
	/// The hub could not bind its listening socket (including the
	/// ephemeral-port fallback).
	#[error("failed to bind remote control server: {0}")]
	Bind(std::io::Error),

	/// A control URL could not be parsed or rewritten.
	#[error("invalid control URL '{url}': {reason}")]
	InvalidUrl { url: String, reason: String },

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
