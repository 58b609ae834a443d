use clap::Parser;
use settop_cli::{cli::Cli, config::ShellConfig, logging, shell};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let config = ShellConfig::from_cli(&cli);
	if let Err(err) = shell::run(config).await {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}
