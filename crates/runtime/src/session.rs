//! Session bridge: pipe client, open state machine, and at-most-one-session
//! bookkeeping.
//!
//! A playback intent enters here as a [`Session`]; the manager makes sure
//! the engine process is running, connects the pipe with bounded retries,
//! sends `open`, and races the first qualifying protocol event against a
//! startup timeout. The loser of that race is inert by construction: the
//! timeout arm is dropped the instant an event wins, and an event arriving
//! after the fallback ran finds no session left to resurrect.
//!
//! All writes go through a single writer task per connection; the wire has
//! no correlation IDs, so the ordering of that queue is the protocol's only
//! ordering guarantee.

use std::time::Duration;

use serde_json::Value;
use settop_protocol::{Command, Event, NavCmd, OpenParams};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::engine::{EngineConfig, EngineSupervisor};
use crate::error::{Error, Result};
use crate::pipe;
use crate::transport::LineTransport;

#[cfg(test)]
mod tests;

/// One logical playback attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
	/// Service key, e.g. `netflix`.
	pub service_key: String,
	/// Storage partition key; isolates credentials per service.
	pub session_key: String,
	/// Target URL.
	pub url: String,
	/// Display the engine window should be restricted to.
	pub display: Option<String>,
	/// Borderless-maximized presentation.
	pub fullscreen: bool,
	/// Optional user-agent override.
	pub user_agent: Option<String>,
}

impl Session {
	/// New session for `service_key`/`url`; the partition key defaults to
	/// the service key.
	pub fn new(service_key: impl Into<String>, url: impl Into<String>) -> Self {
		let service_key = service_key.into();
		Self {
			session_key: service_key.clone(),
			service_key,
			url: url.into(),
			display: None,
			fullscreen: false,
			user_agent: None,
		}
	}

	fn open_params(&self) -> OpenParams {
		OpenParams {
			service: self.service_key.clone(),
			session_key: Some(self.session_key.clone()),
			url: self.url.clone(),
			display: self.display.clone(),
			fullscreen: Some(self.fullscreen),
			user_agent: self.user_agent.clone(),
		}
	}
}

/// Events the bridge publishes toward the presentation layer.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
	/// Protocol event forwarded from the engine process.
	Engine(Event),
	/// The pipe connection went away (engine exit, error, or close).
	PipeClosed,
	/// The DRM session was abandoned; the URL should open in an unmanaged
	/// external browser instead.
	OpenExternal { url: String },
}

/// Tunables for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
	/// Name of the engine pipe.
	pub pipe_name: String,
	/// Engine process configuration.
	pub engine: EngineConfig,
	/// Pipe connect attempts before giving up on an open.
	pub connect_attempts: u32,
	/// Fixed delay between connect attempts.
	pub connect_retry_delay: Duration,
	/// Window for the first `ready`/`navigated` event after `open`.
	pub startup_timeout: Duration,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			pipe_name: "settop-engine".to_string(),
			engine: EngineConfig::default(),
			connect_attempts: 10,
			connect_retry_delay: Duration::from_millis(250),
			startup_timeout: Duration::from_secs(8),
		}
	}
}

/// A live pipe connection: one writer task, one reader task.
struct PipeConnection {
	outbound: mpsc::UnboundedSender<Command>,
	writer_task: JoinHandle<()>,
	reader_task: JoinHandle<()>,
}

impl PipeConnection {
	fn send(&self, command: Command) -> Result<()> {
		self.outbound.send(command).map_err(|_| Error::ChannelClosed)
	}

	fn is_closed(&self) -> bool {
		self.outbound.is_closed() || self.reader_task.is_finished()
	}

	/// Lets the writer drain queued commands (notably a final `close`), then
	/// stops both tasks. Each step is independently fault-tolerant.
	///
	/// Dropping a connection without calling this is also safe: closing the
	/// outbound channel ends the writer task, and the reader task ends when
	/// the peer releases its end of the pipe.
	async fn finish(self) {
		let PipeConnection { outbound, writer_task, reader_task } = self;
		drop(outbound);
		let _ = tokio::time::timeout(Duration::from_secs(1), writer_task).await;
		reader_task.abort();
	}
}

/// Owns the engine process, the pipe connection, and the current session.
///
/// Exactly one session may be open at a time; opening a new one supersedes
/// the prior one at the protocol level, because the engine process does not
/// multiplex sessions.
pub struct SessionManager {
	config: BridgeConfig,
	supervisor: EngineSupervisor,
	conn: Option<PipeConnection>,
	session: Option<Session>,
	events: broadcast::Sender<BridgeEvent>,
}

impl SessionManager {
	pub fn new(config: BridgeConfig) -> Self {
		let supervisor = EngineSupervisor::new(config.engine.clone());
		let (events, _) = broadcast::channel(64);
		Self { config, supervisor, conn: None, session: None, events }
	}

	/// Subscribes to bridge events (engine events, pipe closure, external
	/// fallback intents).
	pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
		self.events.subscribe()
	}

	pub fn current_session(&self) -> Option<&Session> {
		self.session.as_ref()
	}

	pub fn is_connected(&self) -> bool {
		self.conn.as_ref().is_some_and(|conn| !conn.is_closed())
	}

	/// Whether a live engine process is tracked.
	pub fn engine_running(&self) -> bool {
		self.supervisor.is_running()
	}

	/// Opens a playback session: ensures the engine process, connects the
	/// pipe with retries, sends `open`, and waits for the first qualifying
	/// event within the startup window.
	///
	/// On timeout or an `error` event the session is closed and an
	/// [`BridgeEvent::OpenExternal`] fallback intent is published before the
	/// error returns.
	pub async fn open(&mut self, session: Session) -> Result<()> {
		self.supervisor.ensure_started()?;
		if self.conn.as_ref().is_some_and(PipeConnection::is_closed) {
			self.conn = None;
		}

		// Subscribe before connecting so the peer's `ready` is not missed.
		let mut events = self.events.subscribe();
		if self.conn.is_none() {
			self.connect_with_retry().await?;
		}

		let conn = self.conn.as_ref().expect("connection installed above");
		conn.send(Command::Open(session.open_params()))?;
		self.session = Some(session);

		match tokio::time::timeout(self.config.startup_timeout, await_startup(&mut events)).await {
			Ok(Ok(())) => Ok(()),
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "session open failed; falling back to external browser");
				self.fall_back_external().await;
				Err(err)
			}
			Err(_elapsed) => {
				let timeout_ms = self.config.startup_timeout.as_millis() as u64;
				tracing::warn!(timeout_ms, "no startup event from engine; falling back to external browser");
				self.fall_back_external().await;
				Err(Error::StartupTimeout { timeout_ms })
			}
		}
	}

	/// Sends a raw command on the live connection, fire-and-forget. Session
	/// lifecycle belongs to [`Self::open`]/[`Self::close`], which keep the
	/// bookkeeping; this is for injector-produced commands.
	pub fn send(&self, command: Command) -> Result<()> {
		self.live_conn()?.send(command)
	}

	/// History navigation. Valid only while connected.
	pub fn nav(&self, cmd: NavCmd) -> Result<()> {
		self.live_conn()?.send(Command::Nav { cmd })
	}

	/// Runs a script in the engine's loaded page. Valid only while connected.
	pub fn exec(&self, code: impl Into<String>) -> Result<()> {
		self.live_conn()?.send(Command::Exec { code: code.into() })
	}

	/// Posts a structured message into the loaded page. Valid only while
	/// connected.
	pub fn post_message(&self, payload: Value) -> Result<()> {
		self.live_conn()?.send(Command::PostMessage { payload })
	}

	/// Closes the current session.
	///
	/// With a connection present this sends one graceful `close` command and
	/// the engine closes its own window; with no connection the process is
	/// force-killed instead (nothing to write to). Safe to call repeatedly.
	pub async fn close(&mut self) -> Result<()> {
		self.session = None;
		match self.conn.take() {
			Some(conn) => {
				if conn.send(Command::Close).is_err() {
					// Writer already gone; the process may still linger.
					self.supervisor.kill();
				}
				conn.finish().await;
			}
			None => self.supervisor.kill(),
		}
		Ok(())
	}

	/// Call when a [`BridgeEvent::PipeClosed`] is observed: drops the dead
	/// connection and the session it carried.
	pub fn on_pipe_closed(&mut self) {
		if self.conn.as_ref().is_some_and(PipeConnection::is_closed) {
			self.conn = None;
			self.session = None;
		}
	}

	fn live_conn(&self) -> Result<&PipeConnection> {
		match self.conn.as_ref() {
			Some(conn) if !conn.is_closed() => Ok(conn),
			_ => Err(Error::NotConnected),
		}
	}

	async fn connect_with_retry(&mut self) -> Result<()> {
		for attempt in 1..=self.config.connect_attempts {
			match pipe::connect(&self.config.pipe_name).await {
				Ok(stream) => {
					tracing::debug!(attempt, "engine pipe connected");
					self.install_connection(stream);
					return Ok(());
				}
				Err(err) => {
					tracing::debug!(attempt, error = %err, "engine pipe not ready");
					if !self.supervisor.is_running() {
						self.supervisor.ensure_started()?;
					}
					tokio::time::sleep(self.config.connect_retry_delay).await;
				}
			}
		}
		// A process lingering behind an unreachable pipe is a black window
		// the user cannot interact with; tear it down before surfacing.
		self.supervisor.kill();
		Err(Error::ConnectFailed { attempts: self.config.connect_attempts })
	}

	fn install_connection(&mut self, stream: pipe::ClientStream) {
		let (read_half, write_half) = tokio::io::split(stream);
		let (transport, mut decoded) = LineTransport::new(write_half, read_half);
		let (mut sender, receiver) = transport.into_parts();

		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Command>();
		let writer_task = tokio::spawn(async move {
			while let Some(command) = outbound_rx.recv().await {
				if let Err(err) = sender.send(&command).await {
					tracing::warn!(error = %err, "engine pipe write failed");
					break;
				}
			}
		});

		let events = self.events.clone();
		let reader_task = tokio::spawn(async move {
			let forward = async {
				while let Some(value) = decoded.recv().await {
					match serde_json::from_value::<Event>(value) {
						Ok(event) => {
							let _ = events.send(BridgeEvent::Engine(event));
						}
						Err(err) => {
							tracing::warn!(error = %err, "discarding unknown engine event");
						}
					}
				}
			};
			let (io_result, ()) = tokio::join!(receiver.run(), forward);
			if let Err(err) = io_result {
				tracing::warn!(error = %err, "engine pipe read failed");
			}
			let _ = events.send(BridgeEvent::PipeClosed);
		});

		self.conn = Some(PipeConnection { outbound, writer_task, reader_task });
	}

	async fn fall_back_external(&mut self) {
		let url = self.session.as_ref().map(|s| s.url.clone());
		let _ = self.close().await;
		if let Some(url) = url {
			let _ = self.events.send(BridgeEvent::OpenExternal { url });
		}
	}
}

/// Waits for the first event that settles the open: `ready`/`navigated`
/// succeed, `error` and pipe closure fail.
async fn await_startup(events: &mut broadcast::Receiver<BridgeEvent>) -> Result<()> {
	loop {
		match events.recv().await {
			Ok(BridgeEvent::Engine(Event::Ready)) | Ok(BridgeEvent::Engine(Event::Navigated { .. })) => {
				return Ok(());
			}
			Ok(BridgeEvent::Engine(Event::Error { message, code })) => {
				return Err(Error::OpenFailed { code, message });
			}
			Ok(BridgeEvent::PipeClosed) => return Err(Error::ChannelClosed),
			Ok(_) => continue,
			Err(broadcast::error::RecvError::Lagged(_)) => continue,
			Err(broadcast::error::RecvError::Closed) => return Err(Error::ChannelClosed),
		}
	}
}
