//! Broadcast hub for remote controllers.
//!
//! Any message received from a connected client is parsed as a control
//! envelope and re-broadcast to every connected client whose channel is
//! still open, including the sender. The hub also serves the controller's
//! own front-end as static assets and exposes a process-local observer so
//! the hosting shell can watch the channel without opening a socket to
//! itself.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use settop_protocol::RemoteMessage;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Default fixed port; overridable via configuration.
pub const DEFAULT_PORT: u16 = 64028;

/// Configuration for the broadcast hub.
#[derive(Debug, Clone)]
pub struct RemoteServerConfig {
	/// Preferred port. On a bind conflict the hub falls back to an
	/// ephemeral port rather than failing startup.
	pub port: u16,
	/// Root directory of the controller front-end assets.
	pub asset_root: PathBuf,
}

impl Default for RemoteServerConfig {
	fn default() -> Self {
		Self { port: DEFAULT_PORT, asset_root: PathBuf::from("remote-web") }
	}
}

struct HubState {
	clients: HashMap<u64, mpsc::UnboundedSender<Message>>,
	next_client_id: u64,
}

struct Hub {
	state: Mutex<HubState>,
	observer: broadcast::Sender<RemoteMessage>,
}

type SharedHub = Arc<Hub>;

/// A running broadcast hub.
pub struct RemoteServer {
	port: u16,
	observer: broadcast::Sender<RemoteMessage>,
	serve_task: JoinHandle<()>,
}

impl RemoteServer {
	/// Binds the hub and starts serving. Returns once the port is resolved;
	/// serving continues in the background until the server is dropped.
	pub async fn start(config: RemoteServerConfig) -> Result<Self> {
		let (observer, _) = broadcast::channel(64);
		let hub: SharedHub = Arc::new(Hub {
			state: Mutex::new(HubState { clients: HashMap::new(), next_client_id: 0 }),
			observer: observer.clone(),
		});

		let app = Router::new()
			.route(
				"/ws",
				get(|ws: WebSocketUpgrade, State(hub): State<SharedHub>| async move {
					ws.on_upgrade(|socket| handle_controller_socket(socket, hub))
				}),
			)
			.fallback_service(ServeDir::new(&config.asset_root))
			.with_state(hub);

		let listener = match TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).await {
			Ok(listener) => listener,
			Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
				warn!(
					target = "settop",
					port = config.port,
					"remote control port in use; falling back to an ephemeral port"
				);
				TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).await.map_err(Error::Bind)?
			}
			Err(err) => return Err(Error::Bind(err)),
		};
		let port = listener.local_addr().map_err(Error::Bind)?.port();
		info!(target = "settop", port, "remote control hub listening");

		let serve_task = tokio::spawn(async move {
			if let Err(err) = axum::serve(listener, app.into_make_service()).await {
				warn!(target = "settop", error = %err, "remote control hub stopped");
			}
		});

		Ok(Self { port, observer, serve_task })
	}

	/// The resolved listening port.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Process-local observer: every decoded control message, without a
	/// client connection.
	pub fn observe(&self) -> broadcast::Receiver<RemoteMessage> {
		self.observer.subscribe()
	}

	/// Joinable URL for display (QR code, settings page): the best-guess
	/// non-loopback IPv4 of this host, or loopback when none is found.
	pub fn joinable_url(&self) -> String {
		format!("http://{}:{}", host_ipv4(), self.port)
	}
}

impl Drop for RemoteServer {
	fn drop(&mut self) {
		self.serve_task.abort();
	}
}

async fn handle_controller_socket(socket: WebSocket, hub: SharedHub) {
	let (tx, rx) = mpsc::unbounded_channel();
	let id = {
		let mut state = hub.state.lock().await;
		state.next_client_id += 1;
		let id = state.next_client_id;
		state.clients.insert(id, tx);
		id
	};
	info!(target = "settop", client = id, "controller connected");

	let mut rx_stream = UnboundedReceiverStream::new(rx);
	let (mut ws_tx, mut ws_rx) = socket.split();

	let send_task = tokio::spawn(async move {
		while let Some(msg) = rx_stream.next().await {
			if ws_tx.send(msg).await.is_err() {
				break;
			}
		}
	});

	while let Some(msg) = ws_rx.next().await {
		match msg {
			Ok(Message::Text(text)) => handle_controller_message(&hub, text.as_str()).await,
			Ok(Message::Close(_)) => break,
			Ok(_) => {}
			Err(err) => {
				warn!(target = "settop", client = id, error = %err, "controller socket error");
				break;
			}
		}
	}

	hub.state.lock().await.clients.remove(&id);
	send_task.abort();
	info!(target = "settop", client = id, "controller disconnected");
}

async fn handle_controller_message(hub: &SharedHub, raw: &str) {
	// Anything that is not a control envelope is dropped; a hostile or
	// broken controller must not take the hub down.
	let msg = match serde_json::from_str::<RemoteMessage>(raw) {
		Ok(msg) => msg,
		Err(err) => {
			debug!(target = "settop", error = %err, "discarding malformed control frame");
			return;
		}
	};

	let _ = hub.observer.send(msg);

	// Symmetric broadcast: every open client gets the frame, sender included.
	let clients: Vec<mpsc::UnboundedSender<Message>> =
		hub.state.lock().await.clients.values().cloned().collect();
	for tx in clients {
		let _ = tx.send(Message::Text(raw.to_string().into()));
	}
}

/// Best-guess non-loopback IPv4 of this host. The UDP socket is never
/// written to; connecting it only asks the OS which interface would route
/// out.
fn host_ipv4() -> IpAddr {
	let guess = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
		.and_then(|socket| {
			socket.connect(("8.8.8.8", 80))?;
			socket.local_addr()
		})
		.map(|addr| addr.ip());
	match guess {
		Ok(ip) if !ip.is_loopback() => ip,
		_ => IpAddr::V4(Ipv4Addr::LOCALHOST),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn joinable_url_shape() {
		let url = format!("http://{}:{}", host_ipv4(), 64028);
		assert!(url.starts_with("http://"));
		assert!(url.ends_with(":64028"));
	}
}
