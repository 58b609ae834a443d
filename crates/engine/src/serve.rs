//! Pipe server and command dispatch.
//!
//! The peer binds the named pipe, accepts exactly one shell connection,
//! and serves it for the process lifetime. Decoded commands are marshalled
//! onto the task that owns the view; the read loop itself never touches
//! view state. Events funnel through a single writer task, keeping the
//! wire single-writer.

use std::path::PathBuf;

use settop_protocol::{Command, ErrorCode, Event};
use settop_runtime::pipe;
use settop_runtime::transport::LineTransport;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::partition;
use crate::view::{EngineView, ViewEvents, ViewRequest};

/// Configuration for serving one shell connection.
#[derive(Debug, Clone)]
pub struct ServeConfig {
	/// Name of the pipe to bind.
	pub pipe_name: String,
	/// Override for the partition base directory (tests); defaults to the
	/// local data dir.
	pub data_dir: Option<PathBuf>,
}

impl Default for ServeConfig {
	fn default() -> Self {
		Self { pipe_name: "settop-engine".to_string(), data_dir: None }
	}
}

/// Serves the pipe until the shell closes the session or drops the
/// connection. An unexpected disconnect is fatal for the window: the view
/// is closed on every exit path.
pub async fn serve<V: EngineView>(config: ServeConfig, view: V) -> Result<()> {
	let listener = pipe::bind(&config.pipe_name).map_err(Error::Pipe)?;
	tracing::info!(pipe = %config.pipe_name, "awaiting shell connection");
	let stream = listener.accept().await.map_err(Error::Pipe)?;
	tracing::info!("shell connected");

	let (read_half, write_half) = tokio::io::split(stream);
	let (transport, mut commands) = LineTransport::new(write_half, read_half);
	let (mut sender, receiver) = transport.into_parts();

	// Single writer: every event goes through this queue.
	let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
	let writer_task = tokio::spawn(async move {
		while let Some(event) = event_rx.recv().await {
			if let Err(err) = sender.send(&event).await {
				tracing::warn!(error = %err, "pipe write failed");
				break;
			}
		}
	});
	let reader_task = tokio::spawn(receiver.run());

	// The view lives on its own task; command handling is marshalled there.
	let (calls_tx, calls_rx) = mpsc::unbounded_channel::<Command>();
	let view_task = tokio::spawn(run_view(view, calls_rx, event_tx.clone(), config.data_dir));

	// Exactly once, after the connection is established.
	let _ = event_tx.send(Event::Ready);

	while let Some(value) = commands.recv().await {
		match serde_json::from_value::<Command>(value) {
			Ok(Command::Close) => {
				tracing::info!("close requested by shell");
				let _ = calls_tx.send(Command::Close);
				break;
			}
			Ok(command) => {
				if calls_tx.send(command).is_err() {
					let _ = event_tx
						.send(Event::Error {
							message: "view task is gone".to_string(),
							code: ErrorCode::Startup,
						});
					break;
				}
			}
			Err(err) => {
				// Valid JSON that is not a known command; report and go on.
				let _ = event_tx.send(Event::Error {
					message: err.to_string(),
					code: ErrorCode::Parser,
				});
			}
		}
	}

	// Shell gone or session closed: release the view, flush events, stop.
	drop(calls_tx);
	let _ = view_task.await;
	drop(event_tx);
	let _ = writer_task.await;
	reader_task.abort();
	tracing::info!("engine pipe released");
	Ok(())
}

/// The view-owning task. Every mutation of view state happens here, never
/// on the read loop.
async fn run_view<V: EngineView>(
	mut view: V,
	mut calls: mpsc::UnboundedReceiver<Command>,
	events: mpsc::UnboundedSender<Event>,
	data_dir: Option<PathBuf>,
) {
	let events = ViewEvents::new(events);
	while let Some(command) = calls.recv().await {
		match command {
			Command::Open(params) => {
				let partition =
					partition::partition_dir(data_dir.as_deref(), params.partition_key());
				match partition {
					Ok(partition_dir) => {
						let request = ViewRequest {
							url: params.url.clone(),
							partition_dir,
							user_agent: params.user_agent.clone(),
							fullscreen: params.wants_fullscreen(),
							display: params.display.clone(),
						};
						if let Err(err) = view.open(request, events.clone()) {
							events.error(err.code(), err.to_string());
						}
					}
					Err(err) => {
						events.error(ErrorCode::Open, format!("partition setup failed: {err}"));
					}
				}
			}
			Command::Nav { cmd } => view.history(cmd),
			Command::Exec { code } => {
				if let Err(err) = view.exec(&code) {
					events.error(err.code(), err.to_string());
				}
			}
			Command::PostMessage { payload } => {
				if let Err(err) = view.post_message(&payload) {
					events.error(err.code(), err.to_string());
				}
			}
			Command::SetBounds { x, y, width, height } => view.set_bounds(x, y, width, height),
			Command::Close => break,
		}
	}
	view.close();
}
