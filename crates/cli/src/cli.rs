use std::path::PathBuf;

use clap::Parser;

/// Root CLI for the settop shell.
#[derive(Parser, Debug)]
#[command(name = "settop")]
#[command(about = "10-foot media shell with out-of-process DRM playback")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Preferred port for the remote control hub (falls back to an
	/// ephemeral port on conflict).
	#[arg(long, value_name = "PORT")]
	pub remote_port: Option<u16>,

	/// Engine executable override.
	#[arg(long, value_name = "PATH")]
	pub engine: Option<PathBuf>,

	/// Pipe name for the engine channel.
	#[arg(long, value_name = "NAME")]
	pub pipe_name: Option<String>,

	/// Root directory of the controller front-end assets.
	#[arg(long, value_name = "DIR")]
	pub assets: Option<PathBuf>,

	/// Open this URL immediately after startup.
	#[arg(long, value_name = "URL")]
	pub open: Option<String>,
}
