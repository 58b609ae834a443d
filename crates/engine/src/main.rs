use clap::Parser;
use settop_engine::{HeadlessView, ServeConfig, serve};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// DRM playback engine process for the settop shell.
///
/// Spawned by the shell; all control traffic arrives over the named pipe,
/// stdio is inherited for diagnostics only.
#[derive(Parser, Debug)]
#[command(name = "settop-engine")]
#[command(about = "Out-of-process rendering engine for the settop shell")]
#[command(version)]
struct Args {
	/// Pipe name to bind and serve.
	#[arg(long, default_value = "settop-engine")]
	pipe: String,

	/// Override for the storage partition base directory.
	#[arg(long, value_name = "DIR")]
	data_dir: Option<std::path::PathBuf>,

	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

#[tokio::main]
async fn main() {
	let args = Args::parse();
	init_logging(args.verbose);

	// DRM module passthrough: consumed by the platform view when it binds
	// the embedded engine; nothing to do when unset.
	if let Ok(path) = std::env::var("WIDEVINE_CDM_PATH") {
		tracing::info!(path, "DRM capability module configured");
	}

	let config = ServeConfig { pipe_name: args.pipe, data_dir: args.data_dir };
	if let Err(err) = serve(config, HeadlessView::new()).await {
		tracing::error!(error = %err, "engine terminated abnormally");
		std::process::exit(1);
	}
}

fn init_logging(verbosity: u8) {
	let filter = match verbosity {
		0 => "warn",
		1 => "info",
		_ => "debug",
	};
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
