//! Engine process supervision.
//!
//! The engine is a separate executable embedding a browser engine with
//! native DRM capability; all control traffic runs over the named pipe, so
//! the supervisor only tracks the process handle. Resolution of the
//! executable path is a configuration concern: an explicit override first,
//! then the packaged layout (sibling of the shell binary), then the
//! development layout under `target/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use crate::error::{Error, Result};

/// Configuration for spawning the engine process.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
	/// Explicit executable path; when unset the standard layouts are probed.
	pub executable: Option<PathBuf>,
	/// Arguments passed to the engine (typically the pipe name).
	pub args: Vec<String>,
	/// Extra environment for the child, e.g. the DRM module passthrough
	/// (`WIDEVINE_CDM_PATH`/`WIDEVINE_CDM_VERSION`). No-op when empty.
	pub env: Vec<(String, String)>,
}

/// Locates the engine executable.
///
/// Order: explicit override, `SETTOP_ENGINE_EXE`, sibling of the current
/// executable (packaged layout), `target/{debug,release}` under the working
/// directory (development layout). An override that does not exist on disk
/// is logged and skipped rather than trusted.
pub fn resolve_engine_executable(explicit: Option<&Path>) -> Result<PathBuf> {
	if let Some(path) = explicit {
		if path.exists() {
			return Ok(path.to_path_buf());
		}
		tracing::warn!(path = %path.display(), "configured engine executable missing; probing layouts");
	}

	if let Ok(env_path) = std::env::var("SETTOP_ENGINE_EXE") {
		let path = PathBuf::from(env_path);
		if path.exists() {
			return Ok(path);
		}
		tracing::warn!(path = %path.display(), "SETTOP_ENGINE_EXE does not exist; probing layouts");
	}

	if let Ok(current) = std::env::current_exe() {
		if let Some(dir) = current.parent() {
			let candidate = dir.join(engine_exe_name());
			if candidate.exists() {
				return Ok(candidate);
			}
		}
	}

	if let Ok(cwd) = std::env::current_dir() {
		for profile in ["debug", "release"] {
			let candidate = cwd.join("target").join(profile).join(engine_exe_name());
			if candidate.exists() {
				return Ok(candidate);
			}
		}
	}

	Err(Error::EngineNotFound)
}

fn engine_exe_name() -> &'static str {
	if cfg!(windows) { "settop-engine.exe" } else { "settop-engine" }
}

/// Tracked handle for a live engine process.
struct EngineHandle {
	pid: u32,
	kill_tx: oneshot::Sender<()>,
	exited: watch::Receiver<bool>,
}

/// Spawns and tears down the engine process.
///
/// The supervisor tracks at most one live process. A watcher task waits on
/// the child and clears the handle on exit (any code) - an exited process
/// can never still be reported as running. Teardown is best-effort and
/// fire-and-forget: `kill` does not confirm process death before clearing
/// the handle.
pub struct EngineSupervisor {
	config: EngineConfig,
	slot: Arc<Mutex<Option<EngineHandle>>>,
}

impl EngineSupervisor {
	pub fn new(config: EngineConfig) -> Self {
		Self { config, slot: Arc::new(Mutex::new(None)) }
	}

	/// Spawns the engine if no live handle is tracked. Idempotent: repeated
	/// or concurrent calls while the process is alive are no-ops.
	pub fn ensure_started(&self) -> Result<()> {
		let mut slot = self.slot.lock();
		if let Some(handle) = slot.as_ref() {
			if !*handle.exited.borrow() {
				return Ok(());
			}
		}

		let exe = resolve_engine_executable(self.config.executable.as_deref())?;
		let mut cmd = tokio::process::Command::new(&exe);
		cmd.args(&self.config.args)
			.stdin(std::process::Stdio::null())
			// stdout/stderr stay inherited for diagnostics; control traffic
			// runs over the pipe only.
			.stdout(std::process::Stdio::inherit())
			.stderr(std::process::Stdio::inherit());
		for (key, value) in &self.config.env {
			cmd.env(key, value);
		}

		let mut child = cmd
			.spawn()
			.map_err(|err| Error::LaunchFailed(format!("{}: {err}", exe.display())))?;
		let pid = child.id().unwrap_or_default();
		tracing::info!(pid, exe = %exe.display(), "engine process started");

		let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
		let (exit_tx, exited) = watch::channel(false);
		let slot_ref = Arc::downgrade(&self.slot);
		tokio::spawn(async move {
			let exited_on_its_own = tokio::select! {
				status = child.wait() => {
					match status {
						Ok(status) => tracing::info!(pid, %status, "engine process exited"),
						Err(err) => tracing::warn!(pid, error = %err, "engine process wait failed"),
					}
					true
				}
				// Explicit kill, or the supervisor itself was dropped.
				_ = &mut kill_rx => false,
			};
			if !exited_on_its_own {
				let _ = child.start_kill();
				let _ = child.wait().await;
				tracing::info!(pid, "engine process killed");
			}
			let _ = exit_tx.send(true);
			if let Some(slot) = slot_ref.upgrade() {
				let mut slot = slot.lock();
				if slot.as_ref().map(|h| h.pid) == Some(pid) {
					*slot = None;
				}
			}
		});

		*slot = Some(EngineHandle { pid, kill_tx, exited });
		Ok(())
	}

	/// Whether a live process handle is tracked.
	pub fn is_running(&self) -> bool {
		self.slot
			.lock()
			.as_ref()
			.is_some_and(|handle| !*handle.exited.borrow())
	}

	/// PID of the tracked process, if any.
	pub fn pid(&self) -> Option<u32> {
		self.slot.lock().as_ref().map(|handle| handle.pid)
	}

	/// Force-terminates the engine, swallowing errors. Safe to call with no
	/// process tracked.
	pub fn kill(&self) {
		if let Some(handle) = self.slot.lock().take() {
			let _ = handle.kill_tx.send(());
		}
	}

	/// Resolves once the tracked process has exited; immediately when none
	/// is tracked.
	pub async fn wait_exited(&self) {
		let exited = match self.slot.lock().as_ref() {
			Some(handle) => handle.exited.clone(),
			None => return,
		};
		let mut exited = exited;
		while !*exited.borrow() {
			if exited.changed().await.is_err() {
				return;
			}
		}
	}
}
