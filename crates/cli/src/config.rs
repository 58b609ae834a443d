//! Shell configuration: CLI flags first, environment second, defaults last.
//!
//! Environment variables: `SETTOP_REMOTE_PORT` (hub port),
//! `SETTOP_PIPE_NAME` (engine channel), `SETTOP_ENGINE_EXE` (consumed by
//! executable resolution in the runtime), and the DRM passthrough pair
//! `WIDEVINE_CDM_PATH`/`WIDEVINE_CDM_VERSION`, forwarded verbatim to the
//! engine process and a no-op when unset.

use settop_remote::RemoteServerConfig;
use settop_runtime::{BridgeConfig, EngineConfig};

use crate::cli::Cli;

/// Fully resolved shell configuration.
#[derive(Debug, Clone)]
pub struct ShellConfig {
	pub remote: RemoteServerConfig,
	pub bridge: BridgeConfig,
	pub startup_url: Option<String>,
}

impl ShellConfig {
	pub fn from_cli(cli: &Cli) -> Self {
		let remote_port = pick(
			cli.remote_port,
			std::env::var("SETTOP_REMOTE_PORT").ok().and_then(|raw| raw.parse().ok()),
			settop_remote::server::DEFAULT_PORT,
		);
		let pipe_name = pick(
			cli.pipe_name.clone(),
			std::env::var("SETTOP_PIPE_NAME").ok(),
			"settop-engine".to_string(),
		);
		let asset_root = pick(cli.assets.clone(), None, RemoteServerConfig::default().asset_root);

		let engine = EngineConfig {
			executable: cli.engine.clone(),
			args: vec!["--pipe".to_string(), pipe_name.clone()],
			env: drm_passthrough(),
		};

		Self {
			remote: RemoteServerConfig { port: remote_port, asset_root },
			bridge: BridgeConfig { pipe_name, engine, ..BridgeConfig::default() },
			startup_url: cli.open.clone(),
		}
	}
}

/// CLI flag, then environment, then default.
fn pick<T>(cli: Option<T>, env: Option<T>, default: T) -> T {
	cli.or(env).unwrap_or(default)
}

/// The DRM capability module passthrough for the engine process.
fn drm_passthrough() -> Vec<(String, String)> {
	["WIDEVINE_CDM_PATH", "WIDEVINE_CDM_VERSION"]
		.into_iter()
		.filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cli_wins_over_env_and_default() {
		assert_eq!(pick(Some(1u16), Some(2), 3), 1);
		assert_eq!(pick(None, Some(2u16), 3), 2);
		assert_eq!(pick::<u16>(None, None, 3), 3);
	}

	#[test]
	fn engine_args_carry_the_pipe_name() {
		let cli = Cli {
			verbose: 0,
			remote_port: Some(7001),
			engine: None,
			pipe_name: Some("custom-pipe".to_string()),
			assets: None,
			open: None,
		};
		let config = ShellConfig::from_cli(&cli);
		assert_eq!(config.remote.port, 7001);
		assert_eq!(config.bridge.pipe_name, "custom-pipe");
		assert_eq!(
			config.bridge.engine.args,
			vec!["--pipe".to_string(), "custom-pipe".to_string()]
		);
	}
}
