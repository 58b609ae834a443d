use settop_protocol::ErrorCode;

use super::*;

fn manager_config(pipe_name: &str) -> BridgeConfig {
	BridgeConfig {
		pipe_name: pipe_name.to_string(),
		engine: EngineConfig {
			executable: Some("/bin/sleep".into()),
			args: vec!["30".to_string()],
			env: Vec::new(),
		},
		connect_attempts: 5,
		connect_retry_delay: Duration::from_millis(25),
		startup_timeout: Duration::from_millis(500),
	}
}

#[tokio::test]
async fn fire_and_forget_commands_require_connection() {
	let manager = SessionManager::new(BridgeConfig::default());
	assert!(matches!(manager.nav(NavCmd::Back), Err(Error::NotConnected)));
	assert!(matches!(manager.exec("1 + 1"), Err(Error::NotConnected)));
	assert!(matches!(
		manager.post_message(serde_json::json!({"v": 1})),
		Err(Error::NotConnected)
	));
}

#[cfg(unix)]
mod pipe_backed {
	use serde_json::Value;

	use super::*;

	/// In-test stand-in for the engine peer: serves the pipe, exposes the
	/// decoded commands, and writes whatever events the test scripts. The
	/// automatic `ready` on connect is suppressed so each test controls
	/// exactly which startup events the bridge observes.
	struct FakePeer {
		commands: mpsc::UnboundedReceiver<Value>,
		events: mpsc::UnboundedSender<Event>,
	}

	fn spawn_fake_peer(pipe_name: &str) -> FakePeer {
		let listener = pipe::bind(pipe_name).unwrap();
		let (commands_tx, commands) = mpsc::unbounded_channel();
		let (events, mut events_rx) = mpsc::unbounded_channel::<Event>();
		tokio::spawn(async move {
			let stream = listener.accept().await.unwrap();
			let (read_half, write_half) = tokio::io::split(stream);
			let (transport, mut decoded) = LineTransport::new(write_half, read_half);
			let (mut sender, receiver) = transport.into_parts();
			tokio::spawn(receiver.run());
			loop {
				tokio::select! {
					value = decoded.recv() => match value {
						Some(value) => {
							if commands_tx.send(value).is_err() {
								break;
							}
						}
						None => break,
					},
					event = events_rx.recv() => match event {
						Some(event) => sender.send(&event).await.unwrap(),
						None => break,
					},
				}
			}
		});
		FakePeer { commands, events }
	}

	fn pipe_name(dir: &tempfile::TempDir) -> String {
		dir.path().join("engine.sock").to_str().unwrap().to_string()
	}

	#[tokio::test]
	async fn open_succeeds_on_navigated() {
		let dir = tempfile::tempdir().unwrap();
		let name = pipe_name(&dir);
		let mut peer = spawn_fake_peer(&name);

		let mut manager = SessionManager::new(manager_config(&name));
		let mut events = manager.subscribe();

		let mut session = Session::new("netflix", "https://www.netflix.com/browse");
		session.fullscreen = true;

		let open = async {
			let result = manager.open(session).await;
			(manager, result)
		};
		let peer_logic = async {
			let open_cmd = peer.commands.recv().await.unwrap();
			assert_eq!(open_cmd["type"], "open");
			assert_eq!(open_cmd["service"], "netflix");
			assert_eq!(open_cmd["sessionKey"], "netflix");
			assert_eq!(open_cmd["fullscreen"], true);
			peer.events
				.send(Event::Navigated { url: open_cmd["url"].as_str().unwrap().to_string() })
				.unwrap();
			peer
		};
		let ((mut manager, result), mut peer) = tokio::join!(open, peer_logic);
		result.unwrap();
		assert!(manager.is_connected());
		assert!(manager.current_session().is_some());

		// No fallback fired: the event stream holds engine events only.
		while let Ok(event) = events.try_recv() {
			assert!(!matches!(event, BridgeEvent::OpenExternal { .. }));
		}

		// Graceful close: exactly one close command, no forced kill.
		manager.close().await.unwrap();
		let close_cmd = peer.commands.recv().await.unwrap();
		assert_eq!(close_cmd["type"], "close");
		assert!(peer.commands.recv().await.is_none(), "nothing after close");
		assert!(manager.engine_running(), "graceful close must not kill the process");
		manager.supervisor.kill();
	}

	#[tokio::test]
	async fn startup_timeout_falls_back_to_external() {
		let dir = tempfile::tempdir().unwrap();
		let name = pipe_name(&dir);
		let mut peer = spawn_fake_peer(&name);

		let mut config = manager_config(&name);
		config.startup_timeout = Duration::from_millis(150);
		let mut manager = SessionManager::new(config);
		let mut events = manager.subscribe();

		let url = "https://www.netflix.com/browse";
		let result = manager.open(Session::new("netflix", url)).await;
		assert!(matches!(result, Err(Error::StartupTimeout { .. })));
		assert!(manager.current_session().is_none());
		assert!(!manager.is_connected());

		// The close path ran: the peer observed open then close.
		let open_cmd = peer.commands.recv().await.unwrap();
		assert_eq!(open_cmd["type"], "open");
		let close_cmd = peer.commands.recv().await.unwrap();
		assert_eq!(close_cmd["type"], "close");

		// The fallback intent was published.
		let mut saw_fallback = false;
		while let Ok(event) = events.try_recv() {
			if let BridgeEvent::OpenExternal { url: fallback } = event {
				assert_eq!(fallback, url);
				saw_fallback = true;
			}
		}
		assert!(saw_fallback);
		manager.supervisor.kill();
	}

	#[tokio::test]
	async fn error_event_during_open_falls_back() {
		let dir = tempfile::tempdir().unwrap();
		let name = pipe_name(&dir);
		let mut peer = spawn_fake_peer(&name);

		let mut manager = SessionManager::new(manager_config(&name));
		let mut events = manager.subscribe();

		let open = manager.open(Session::new("disney", "https://www.disneyplus.com"));
		let peer_logic = async {
			let open_cmd = peer.commands.recv().await.unwrap();
			assert_eq!(open_cmd["type"], "open");
			peer.events
				.send(Event::Error {
					message: "partition init failed".to_string(),
					code: ErrorCode::Open,
				})
				.unwrap();
		};
		let (result, ()) = tokio::join!(open, peer_logic);
		assert!(matches!(result, Err(Error::OpenFailed { code: ErrorCode::Open, .. })));

		let mut saw_fallback = false;
		while let Ok(event) = events.try_recv() {
			if matches!(event, BridgeEvent::OpenExternal { .. }) {
				saw_fallback = true;
			}
		}
		assert!(saw_fallback);
		manager.supervisor.kill();
	}

	#[tokio::test]
	async fn exhausted_connects_tear_down_the_process() {
		let dir = tempfile::tempdir().unwrap();
		// No peer listening at this name.
		let name = pipe_name(&dir);

		let mut config = manager_config(&name);
		config.connect_attempts = 2;
		config.connect_retry_delay = Duration::from_millis(10);
		let mut manager = SessionManager::new(config);

		let result = manager.open(Session::new("prime", "https://www.primevideo.com")).await;
		assert!(matches!(result, Err(Error::ConnectFailed { attempts: 2 })));
		assert!(!manager.engine_running(), "unreachable engine must be torn down");
	}

	#[tokio::test]
	async fn close_without_connection_kills_the_process() {
		let dir = tempfile::tempdir().unwrap();
		let mut manager = SessionManager::new(manager_config(&pipe_name(&dir)));
		manager.supervisor.ensure_started().unwrap();
		assert!(manager.engine_running());

		manager.close().await.unwrap();
		assert!(!manager.engine_running());

		// Idempotent: closing again with nothing tracked is a no-op.
		manager.close().await.unwrap();
	}
}
