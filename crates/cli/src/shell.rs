//! Shell wiring: control messages in, bridge events out.
//!
//! The shell joins its own broadcast hub as a control client (the
//! advertised address may only be reachable via loopback from here, which
//! the client's address-strategy fallback covers), translates control
//! messages into session or injector calls, and applies the engine-fault
//! policy: any engine error abandons the DRM session and reopens the URL
//! in the external browser.

use anyhow::Context;
use settop_protocol::{Command, Event, NavCmd, RemoteMessage};
use settop_remote::{RemoteClient, RemoteServer};
use settop_runtime::{Bounds, BridgeEvent, DpadKey, InputInjector, SessionManager};
use tokio::sync::mpsc;

use crate::config::ShellConfig;
use crate::external;
use crate::services;

/// One decoded controller intent.
#[derive(Debug, PartialEq)]
pub enum ControlAction {
	Open { url: String },
	Dpad(DpadKey),
	Back,
	Home,
	PlayToggle,
	PointerMove { dx: f64, dy: f64 },
	PointerClick,
	Scroll { dx: f64, dy: f64 },
	Volume { up: bool },
	Ignored,
}

/// Maps a control message to an action. Unknown commands and commands with
/// unusable payloads map to [`ControlAction::Ignored`] - a broken
/// controller must never wedge the shell.
pub fn parse_control(msg: &RemoteMessage) -> ControlAction {
	let number = |field: &str| -> Option<f64> {
		msg.payload.as_ref()?.get(field)?.as_f64()
	};
	match msg.cmd.as_str() {
		"open" => match msg.payload.as_ref().and_then(|p| p.get("url")).and_then(|u| u.as_str()) {
			Some(url) => ControlAction::Open { url: url.to_string() },
			None => ControlAction::Ignored,
		},
		"nav:up" => ControlAction::Dpad(DpadKey::Up),
		"nav:down" => ControlAction::Dpad(DpadKey::Down),
		"nav:left" => ControlAction::Dpad(DpadKey::Left),
		"nav:right" => ControlAction::Dpad(DpadKey::Right),
		"nav:ok" => ControlAction::Dpad(DpadKey::Ok),
		"nav:back" => ControlAction::Back,
		"home" => ControlAction::Home,
		"play:toggle" => ControlAction::PlayToggle,
		"ptr:move" => match (number("dx"), number("dy")) {
			// Controllers report upward swipes as positive dy; the page's y
			// axis grows downward, so the vertical delta flips sign here.
			(Some(dx), Some(dy)) => ControlAction::PointerMove { dx, dy: -dy },
			_ => ControlAction::Ignored,
		},
		"ptr:click" => ControlAction::PointerClick,
		"scroll" => match (number("dx"), number("dy")) {
			(Some(dx), Some(dy)) => ControlAction::Scroll { dx, dy },
			_ => ControlAction::Ignored,
		},
		"vol:up" => ControlAction::Volume { up: true },
		"vol:down" => ControlAction::Volume { up: false },
		_ => ControlAction::Ignored,
	}
}

enum ShellInput {
	Remote(RemoteMessage),
	Bridge(BridgeEvent),
}

/// Runs the shell until interrupted.
pub async fn run(config: ShellConfig) -> anyhow::Result<()> {
	let remote = RemoteServer::start(config.remote.clone())
		.await
		.context("starting remote control hub")?;
	tracing::info!(
		target = "settop",
		url = %remote.joinable_url(),
		"remote control ready; open this URL on your phone"
	);

	let mut manager = SessionManager::new(config.bridge.clone());
	let mut injector = InputInjector::new(Bounds::default());

	let (input_tx, mut input_rx) = mpsc::unbounded_channel::<ShellInput>();

	// Bridge events feed the same single-threaded loop as control messages.
	let mut bridge_events = manager.subscribe();
	let bridge_tx = input_tx.clone();
	tokio::spawn(async move {
		loop {
			match bridge_events.recv().await {
				Ok(event) => {
					if bridge_tx.send(ShellInput::Bridge(event)).is_err() {
						break;
					}
				}
				Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
				Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
			}
		}
	});

	let client = RemoteClient::new();
	let remote_tx = input_tx.clone();
	client.on_any(move |msg| {
		let _ = remote_tx.send(ShellInput::Remote(msg.clone()));
	});
	client.connect(remote.joinable_url());

	if let Some(url) = &config.startup_url {
		open_intent(&mut manager, url).await;
	}

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				tracing::info!(target = "settop", "interrupt received; shutting down");
				break;
			}
			input = input_rx.recv() => match input {
				Some(ShellInput::Remote(msg)) => {
					handle_control(&mut manager, &mut injector, &msg).await;
				}
				Some(ShellInput::Bridge(event)) => handle_bridge(&mut manager, event).await,
				None => break,
			}
		}
	}

	client.disconnect();
	let _ = manager.close().await;
	Ok(())
}

async fn handle_control(
	manager: &mut SessionManager,
	injector: &mut InputInjector,
	msg: &RemoteMessage,
) {
	match parse_control(msg) {
		ControlAction::Open { url } => open_intent(manager, &url).await,
		ControlAction::Dpad(key) => {
			if manager.is_connected() {
				inject(manager, injector.dpad(key));
			} else {
				// Without a DRM session, navigation belongs to the
				// presentation layer; nothing to drive from here.
				tracing::debug!(target = "settop", cmd = %msg.cmd, "presentation navigation");
			}
		}
		ControlAction::Back => {
			if manager.is_connected() {
				if let Err(err) = manager.nav(NavCmd::Back) {
					tracing::warn!(target = "settop", error = %err, "history navigation failed");
				}
			} else {
				tracing::debug!(target = "settop", "presentation back");
			}
		}
		ControlAction::Home => {
			// Home always leaves playback; an open DRM session ends here.
			if manager.current_session().is_some() {
				let _ = manager.close().await;
			}
			tracing::debug!(target = "settop", "presentation home");
		}
		ControlAction::PlayToggle => {
			if manager.is_connected() {
				let play_key = manager
					.current_session()
					.map(|s| services::resolve_service_for_url(&s.url))
					.and_then(|config| config.play_key);
				inject(manager, injector.play_toggle(play_key));
			} else {
				tracing::debug!(target = "settop", "presentation play toggle");
			}
		}
		ControlAction::PointerMove { dx, dy } => {
			if manager.is_connected() {
				inject(manager, injector.pointer_move(dx, dy));
			}
		}
		ControlAction::PointerClick => {
			if manager.is_connected() {
				inject(manager, injector.pointer_click());
			}
		}
		ControlAction::Scroll { dx, dy } => {
			if manager.is_connected() {
				inject(manager, injector.scroll(dx, dy));
			}
		}
		ControlAction::Volume { up } => {
			tracing::debug!(target = "settop", up, "presentation volume");
		}
		ControlAction::Ignored => {
			tracing::debug!(target = "settop", cmd = %msg.cmd, "ignoring control command");
		}
	}
}

/// Sends an injector-produced command down the pipe. Failures are logged,
/// not fatal: the gesture is simply lost with the connection.
fn inject(manager: &SessionManager, command: Command) {
	if let Err(err) = manager.send(command) {
		tracing::warn!(target = "settop", error = %err, "input injection failed");
	}
}

async fn open_intent(manager: &mut SessionManager, url: &str) {
	match services::drm_session_for_url(url) {
		Some(session) => {
			tracing::info!(target = "settop", service = %session.service_key, url, "opening DRM session");
			if let Err(err) = manager.open(session).await {
				// The fallback intent is already published; just record it.
				tracing::warn!(target = "settop", error = %err, "DRM session open failed");
			}
		}
		None => {
			tracing::info!(target = "settop", url, "non-DRM service; handing to presentation layer");
		}
	}
}

async fn handle_bridge(manager: &mut SessionManager, event: BridgeEvent) {
	match event {
		BridgeEvent::Engine(Event::Ready) => {
			tracing::debug!(target = "settop", "engine ready");
		}
		BridgeEvent::Engine(Event::Navigated { url }) => {
			tracing::info!(target = "settop", url, "engine navigated");
		}
		BridgeEvent::Engine(Event::MediaStateChanged { payload }) => {
			tracing::debug!(target = "settop", %payload, "player state");
		}
		BridgeEvent::Engine(Event::Error { message, code }) => {
			// Engine-fault policy: abandon the DRM session, play externally.
			// During an in-flight open the session manager already did both.
			if let Some(url) = manager.current_session().map(|s| s.url.clone()) {
				tracing::warn!(target = "settop", %code, message, "engine fault; abandoning DRM session");
				let _ = manager.close().await;
				external::open_external(&url);
			}
		}
		BridgeEvent::PipeClosed => {
			manager.on_pipe_closed();
			tracing::info!(target = "settop", "engine pipe closed");
		}
		BridgeEvent::OpenExternal { url } => external::open_external(&url),
	}
}
