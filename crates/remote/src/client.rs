//! Self-healing client for the remote control channel.
//!
//! The advertised hub URL carries the host's external IPv4, which may not
//! be reachable from every network position the client runs in (the shell
//! itself usually is local, a phone usually is not). Until a connection has
//! ever succeeded the client alternates between the advertised address and
//! loopback on each failed attempt; once any connection succeeds the
//! strategy is frozen for the life of the client session.
//!
//! Reconnection uses exponential backoff: 1s floor, doubling per failure,
//! capped at 10s. Faults on this channel are never surfaced as hard errors;
//! the controller UI simply shows "disconnected" until a retry lands.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use settop_protocol::RemoteMessage;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::{Error, Result};

/// Floor for the reconnect delay; also its initial value.
pub const RETRY_FLOOR: Duration = Duration::from_secs(1);
/// Cap for the reconnect delay.
pub const RETRY_CAP: Duration = Duration::from_secs(10);

/// Which address a connect attempt targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStrategy {
	/// The advertised external address, as handed to `connect`.
	External,
	/// Loopback on the advertised port.
	Local,
}

impl AddressStrategy {
	fn flipped(self) -> Self {
		match self {
			AddressStrategy::External => AddressStrategy::Local,
			AddressStrategy::Local => AddressStrategy::External,
		}
	}
}

/// Connection bookkeeping for one client session.
#[derive(Debug, Clone)]
pub struct RemoteClientState {
	/// The URL handed to the last `connect` call.
	pub last_url: String,
	/// Address currently targeted. Flips once per failed attempt while no
	/// connection has ever succeeded; frozen afterwards.
	pub address_strategy: AddressStrategy,
	/// Delay before the next reconnect attempt.
	pub retry_delay: Duration,
	/// Whether any attempt in this session has ever succeeded.
	pub ever_connected: bool,
}

impl RemoteClientState {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			last_url: url.into(),
			address_strategy: AddressStrategy::External,
			retry_delay: RETRY_FLOOR,
			ever_connected: false,
		}
	}

	/// A connection opened: reset the delay to its floor and freeze the
	/// strategy for the rest of the session.
	pub fn register_success(&mut self) {
		self.retry_delay = RETRY_FLOOR;
		self.ever_connected = true;
	}

	/// A connection attempt failed (or an established one dropped). Returns
	/// the delay to wait before the next attempt; doubles the stored delay
	/// up to the cap, and flips the address strategy while the session has
	/// never connected.
	pub fn register_failure(&mut self) -> Duration {
		let delay = self.retry_delay;
		if !self.ever_connected {
			self.address_strategy = self.address_strategy.flipped();
		}
		self.retry_delay = (self.retry_delay * 2).min(RETRY_CAP);
		delay
	}

	/// The WebSocket URL the current strategy targets: `http`/`https`
	/// rewritten to `ws`/`wss`, loopback substituted under
	/// [`AddressStrategy::Local`], and the hub's `/ws` endpoint appended.
	pub fn resolve_target(&self) -> Result<Url> {
		let invalid = |reason: &dyn std::fmt::Display| Error::InvalidUrl {
			url: self.last_url.clone(),
			reason: reason.to_string(),
		};
		let mut url = Url::parse(&self.last_url).map_err(|err| invalid(&err))?;

		let scheme = match url.scheme() {
			"http" | "ws" => "ws",
			"https" | "wss" => "wss",
			other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
		};
		url.set_scheme(scheme).map_err(|()| invalid(&"scheme rewrite failed"))?;

		if self.address_strategy == AddressStrategy::Local {
			url.set_host(Some("127.0.0.1")).map_err(|err| invalid(&err))?;
		}
		if url.path() == "/" || url.path().is_empty() {
			url.set_path("/ws");
		}
		Ok(url)
	}
}

type Handler = Arc<dyn Fn(&RemoteMessage) + Send + Sync>;

/// Typed event bus: one named handler per command (replace-on-register),
/// plus an ordered list of wildcard observers.
#[derive(Default)]
struct HandlerBus {
	named: HashMap<String, Handler>,
	wildcard: Vec<Handler>,
}

impl HandlerBus {
	/// Snapshot the handlers that apply to `msg`, named first.
	fn handlers_for(&self, cmd: &str) -> Vec<Handler> {
		let mut handlers = Vec::with_capacity(1 + self.wildcard.len());
		if let Some(handler) = self.named.get(cmd) {
			handlers.push(Arc::clone(handler));
		}
		handlers.extend(self.wildcard.iter().cloned());
		handlers
	}
}

struct ClientInner {
	state: Mutex<Option<RemoteClientState>>,
	bus: Mutex<HandlerBus>,
	active: AtomicBool,
	shutdown: AtomicBool,
	task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the reconnecting control client.
#[derive(Clone)]
pub struct RemoteClient {
	inner: Arc<ClientInner>,
}

impl Default for RemoteClient {
	fn default() -> Self {
		Self::new()
	}
}

impl RemoteClient {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(ClientInner {
				state: Mutex::new(None),
				bus: Mutex::new(HandlerBus::default()),
				active: AtomicBool::new(false),
				shutdown: AtomicBool::new(false),
				task: Mutex::new(None),
			}),
		}
	}

	/// Registers the handler for `cmd`. Exactly one handler exists per
	/// command name; the last registration wins.
	pub fn on(&self, cmd: impl Into<String>, handler: impl Fn(&RemoteMessage) + Send + Sync + 'static) {
		self.inner.bus.lock().named.insert(cmd.into(), Arc::new(handler));
	}

	/// Unregisters the handler for `cmd`, if any.
	pub fn off(&self, cmd: &str) {
		self.inner.bus.lock().named.remove(cmd);
	}

	/// Adds a wildcard observer invoked for every decoded message,
	/// regardless of command name.
	pub fn on_any(&self, handler: impl Fn(&RemoteMessage) + Send + Sync + 'static) {
		self.inner.bus.lock().wildcard.push(Arc::new(handler));
	}

	/// Starts connecting to the hub at `url`. Idempotent while already
	/// connecting or connected: repeated calls are no-ops and do not
	/// restart the session.
	pub fn connect(&self, url: impl Into<String>) {
		if self.inner.active.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.shutdown.store(false, Ordering::SeqCst);
		*self.inner.state.lock() = Some(RemoteClientState::new(url));

		let inner = Arc::clone(&self.inner);
		let task = tokio::spawn(run_loop(inner));
		*self.inner.task.lock() = Some(task);
	}

	/// Stops the session and resets the client state to initial values.
	/// Only an explicit disconnect resets the state.
	pub fn disconnect(&self) {
		self.inner.shutdown.store(true, Ordering::SeqCst);
		self.inner.active.store(false, Ordering::SeqCst);
		*self.inner.state.lock() = None;
		if let Some(task) = self.inner.task.lock().take() {
			task.abort();
		}
	}

	/// Snapshot of the connection bookkeeping, if a session is active.
	pub fn state(&self) -> Option<RemoteClientState> {
		self.inner.state.lock().clone()
	}
}

async fn run_loop(inner: Arc<ClientInner>) {
	loop {
		if inner.shutdown.load(Ordering::SeqCst) {
			break;
		}

		let target = match inner.state.lock().as_ref().map(RemoteClientState::resolve_target) {
			Some(Ok(target)) => target,
			Some(Err(err)) => {
				tracing::warn!(target = "settop", error = %err, "cannot resolve control URL; giving up");
				break;
			}
			None => break,
		};

		match connect_async(target.as_str()).await {
			Ok((ws, _response)) => {
				tracing::info!(target = "settop", url = %target, "control channel connected");
				if let Some(state) = inner.state.lock().as_mut() {
					state.register_success();
				}

				let (_ws_tx, mut ws_rx) = ws.split();
				while let Some(frame) = ws_rx.next().await {
					if inner.shutdown.load(Ordering::SeqCst) {
						return;
					}
					match frame {
						Ok(Message::Text(text)) => dispatch_frame(&inner, &text),
						Ok(Message::Close(_)) => break,
						Ok(_) => {}
						Err(err) => {
							tracing::debug!(target = "settop", error = %err, "control socket error");
							break;
						}
					}
				}
				tracing::info!(target = "settop", "control channel disconnected");
			}
			Err(err) => {
				tracing::debug!(target = "settop", url = %target, error = %err, "control hub not reachable");
			}
		}

		if inner.shutdown.load(Ordering::SeqCst) {
			break;
		}
		let delay = inner
			.state
			.lock()
			.as_mut()
			.map(RemoteClientState::register_failure)
			.unwrap_or(RETRY_FLOOR);
		tokio::time::sleep(delay).await;
	}
}

/// Decodes and dispatches one frame. Malformed frames are silently
/// discarded; a parse error must never take the handler loop down.
fn dispatch_frame(inner: &Arc<ClientInner>, raw: &str) {
	let Ok(msg) = serde_json::from_str::<RemoteMessage>(raw) else {
		tracing::debug!(target = "settop", "discarding malformed control frame");
		return;
	};
	// Handlers are invoked outside the lock so they may re-register freely.
	let handlers = inner.bus.lock().handlers_for(&msg.cmd);
	for handler in handlers {
		handler(&msg);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicU32;

	use super::*;

	#[test]
	fn backoff_doubles_to_cap() {
		let mut state = RemoteClientState::new("http://192.168.1.50:64028");
		let waits: Vec<u64> =
			(0..6).map(|_| state.register_failure().as_millis() as u64).collect();
		assert_eq!(waits, vec![1000, 2000, 4000, 8000, 10000, 10000]);
	}

	#[test]
	fn success_resets_delay_to_floor() {
		let mut state = RemoteClientState::new("http://192.168.1.50:64028");
		for _ in 0..4 {
			state.register_failure();
		}
		state.register_success();
		assert_eq!(state.retry_delay, RETRY_FLOOR);
		assert_eq!(state.register_failure(), RETRY_FLOOR);
	}

	#[test]
	fn strategy_toggles_until_first_success() {
		let mut state = RemoteClientState::new("http://192.168.1.50:64028");
		assert_eq!(state.address_strategy, AddressStrategy::External);

		state.register_failure();
		assert_eq!(state.address_strategy, AddressStrategy::Local);
		state.register_failure();
		assert_eq!(state.address_strategy, AddressStrategy::External);

		state.register_failure();
		assert_eq!(state.address_strategy, AddressStrategy::Local);
		state.register_success();

		// Frozen after the first success: later drops no longer toggle.
		state.register_failure();
		state.register_failure();
		assert_eq!(state.address_strategy, AddressStrategy::Local);
	}

	#[test]
	fn resolve_target_applies_strategy() {
		let mut state = RemoteClientState::new("http://192.168.1.50:64028");
		assert_eq!(state.resolve_target().unwrap().as_str(), "ws://192.168.1.50:64028/ws");

		state.address_strategy = AddressStrategy::Local;
		assert_eq!(state.resolve_target().unwrap().as_str(), "ws://127.0.0.1:64028/ws");
	}

	#[test]
	fn resolve_target_rewrites_https() {
		let state = RemoteClientState::new("https://tv.example:8443");
		assert_eq!(state.resolve_target().unwrap().as_str(), "wss://tv.example:8443/ws");
	}

	#[test]
	fn resolve_target_rejects_garbage() {
		let state = RemoteClientState::new("not a url");
		assert!(state.resolve_target().is_err());
		let state = RemoteClientState::new("ftp://tv.example");
		assert!(state.resolve_target().is_err());
	}

	#[test]
	fn named_handler_replace_and_remove() {
		let client = RemoteClient::new();
		let hits = Arc::new(AtomicU32::new(0));

		let first = Arc::clone(&hits);
		client.on("nav:ok", move |_| {
			first.fetch_add(1, Ordering::SeqCst);
		});
		// Last registration wins: this replaces the counter with +10.
		let second = Arc::clone(&hits);
		client.on("nav:ok", move |_| {
			second.fetch_add(10, Ordering::SeqCst);
		});

		dispatch_frame(&client.inner, r#"{"cmd":"nav:ok"}"#);
		assert_eq!(hits.load(Ordering::SeqCst), 10);

		client.off("nav:ok");
		dispatch_frame(&client.inner, r#"{"cmd":"nav:ok"}"#);
		assert_eq!(hits.load(Ordering::SeqCst), 10);
	}

	#[test]
	fn wildcard_observers_all_fire() {
		let client = RemoteClient::new();
		let hits = Arc::new(AtomicU32::new(0));

		for _ in 0..3 {
			let hits = Arc::clone(&hits);
			client.on_any(move |_| {
				hits.fetch_add(1, Ordering::SeqCst);
			});
		}

		dispatch_frame(&client.inner, r#"{"cmd":"anything"}"#);
		assert_eq!(hits.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn malformed_frames_are_discarded() {
		let client = RemoteClient::new();
		let hits = Arc::new(AtomicU32::new(0));
		let count = Arc::clone(&hits);
		client.on_any(move |_| {
			count.fetch_add(1, Ordering::SeqCst);
		});

		dispatch_frame(&client.inner, "not json");
		dispatch_frame(&client.inner, r#"{"payload": 1}"#);
		assert_eq!(hits.load(Ordering::SeqCst), 0);

		dispatch_frame(&client.inner, r#"{"cmd":"ok"}"#);
		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn connect_is_idempotent_while_active() {
		let client = RemoteClient::new();
		client.connect("http://127.0.0.1:9");
		client.connect("http://10.0.0.1:9");

		// The second call must not restart the session with a new URL.
		assert_eq!(client.state().unwrap().last_url, "http://127.0.0.1:9");
		client.disconnect();
		assert!(client.state().is_none());
	}
}
