//! Error types for the engine peer.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving the pipe.
#[derive(Debug, Error)]
pub enum Error {
	/// Binding or accepting on the named pipe failed.
	#[error("failed to serve engine pipe: {0}")]
	Pipe(std::io::Error),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
