//! The named local channel between the shell and the engine process.
//!
//! A pipe is a process-to-process duplex byte stream identified by a fixed
//! name, not a network socket. On Unix this is a socket file under the
//! runtime directory; on Windows it is a named pipe under `\\.\pipe\`.
//!
//! The shell is always the connecting side; the engine process binds the
//! name and serves exactly one client for its lifetime.

use std::io;
use std::path::PathBuf;

/// Stream type for the connecting (shell) side.
#[cfg(unix)]
pub type ClientStream = tokio::net::UnixStream;
#[cfg(windows)]
pub type ClientStream = tokio::net::windows::named_pipe::NamedPipeClient;

/// Stream type for the serving (engine) side.
#[cfg(unix)]
pub type ServerStream = tokio::net::UnixStream;
#[cfg(windows)]
pub type ServerStream = tokio::net::windows::named_pipe::NamedPipeServer;

/// Connects to the named channel. Fails immediately when no server is
/// listening; callers own any retry policy.
#[cfg(unix)]
pub async fn connect(name: &str) -> io::Result<ClientStream> {
	tokio::net::UnixStream::connect(socket_path(name)).await
}

#[cfg(windows)]
pub async fn connect(name: &str) -> io::Result<ClientStream> {
	tokio::net::windows::named_pipe::ClientOptions::new().open(pipe_path(name))
}

/// One-shot listener: binds the name and accepts a single client.
pub struct PipeListener {
	#[cfg(unix)]
	listener: tokio::net::UnixListener,
	#[cfg(unix)]
	path: PathBuf,
	#[cfg(windows)]
	server: tokio::net::windows::named_pipe::NamedPipeServer,
}

/// Binds the named channel for serving.
#[cfg(unix)]
pub fn bind(name: &str) -> io::Result<PipeListener> {
	let path = socket_path(name);
	// A leftover socket file from a crashed instance would make bind fail.
	if path.exists() {
		let _ = std::fs::remove_file(&path);
	}
	let listener = tokio::net::UnixListener::bind(&path)?;
	Ok(PipeListener { listener, path })
}

#[cfg(windows)]
pub fn bind(name: &str) -> io::Result<PipeListener> {
	let server = tokio::net::windows::named_pipe::ServerOptions::new()
		.first_pipe_instance(true)
		.create(pipe_path(name))?;
	Ok(PipeListener { server })
}

impl PipeListener {
	/// Waits for the single client and returns the connected stream.
	#[cfg(unix)]
	pub async fn accept(self) -> io::Result<ServerStream> {
		let (stream, _addr) = self.listener.accept().await?;
		// The name is no longer needed once the one client is in.
		let _ = std::fs::remove_file(&self.path);
		Ok(stream)
	}

	#[cfg(windows)]
	pub async fn accept(self) -> io::Result<ServerStream> {
		self.server.connect().await?;
		Ok(self.server)
	}
}

/// Resolves a pipe name to a socket path. Names containing a path separator
/// are taken verbatim, which lets tests point both sides at a temp dir.
#[cfg(unix)]
fn socket_path(name: &str) -> PathBuf {
	if name.contains('/') {
		return PathBuf::from(name);
	}
	let dir = std::env::var_os("XDG_RUNTIME_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(std::env::temp_dir);
	dir.join(format!("{name}.sock"))
}

#[cfg(windows)]
fn pipe_path(name: &str) -> String {
	if name.starts_with(r"\\.\pipe\") {
		name.to_string()
	} else {
		format!(r"\\.\pipe\{name}")
	}
}

#[cfg(all(test, unix))]
mod tests {
	use tokio::io::{AsyncReadExt, AsyncWriteExt};

	use super::*;

	#[tokio::test]
	async fn bind_connect_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let name = dir.path().join("engine.sock");
		let name = name.to_str().unwrap();

		let listener = bind(name).unwrap();
		let accept = tokio::spawn(listener.accept());

		let mut client = connect(name).await.unwrap();
		let mut server = accept.await.unwrap().unwrap();

		client.write_all(b"hello\n").await.unwrap();
		let mut buf = [0u8; 6];
		server.read_exact(&mut buf).await.unwrap();
		assert_eq!(&buf, b"hello\n");
	}

	#[tokio::test]
	async fn bind_replaces_stale_socket_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("engine.sock");
		std::fs::write(&path, b"").unwrap();

		let listener = bind(path.to_str().unwrap()).unwrap();
		drop(listener);
	}

	#[tokio::test]
	async fn connect_without_server_fails() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("missing.sock");
		assert!(connect(path.to_str().unwrap()).await.is_err());
	}
}
