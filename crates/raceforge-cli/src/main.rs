use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use raceforge_core::config::Overrides;
use raceforge_core::error::Error;
use raceforge_core::orchestrator::Orchestrator;

mod banner;
mod report;

const EXIT_OK: u8 = 0;
const EXIT_FAILURE: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;
const EXIT_CONFIG_ERROR: u8 = 2;

/// raceforge - race-condition exploitation orchestrator for HTTP services
#[derive(Parser)]
#[command(name = "raceforge")]
#[command(version, about, long_about = None)]
struct Cli {
	/// Path to the workflow YAML file
	config: PathBuf,

	/// Username made available to templates as `{{user}}`
	#[arg(long)]
	user: Option<String>,

	/// Password made available to templates as `{{password}}`. The
	/// `PASSWORD` environment variable takes precedence over this flag.
	#[arg(long)]
	password: Option<String>,

	/// Base32 TOTP seed; when set, `{{__totp__}}` resolves to a live code
	#[arg(long)]
	seed: Option<String>,

	/// Overrides every race block's worker count
	#[arg(long)]
	threads: Option<usize>,

	/// Overrides the target host
	#[arg(long)]
	host: Option<String>,

	/// Overrides the target port
	#[arg(long)]
	port: Option<u16>,

	/// Verbose logging; also suppresses the startup banner
	#[arg(short, long)]
	verbose: bool,
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	if !cli.verbose {
		println!("{}", banner::BANNER);
	}

	let cancel = Arc::new(AtomicBool::new(false));
	{
		let cancel = Arc::clone(&cancel);
		if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed)) {
			tracing::warn!("failed to install SIGINT handler: {e}");
		}
	}

	match run(&cli, cancel) {
		Ok(()) => ExitCode::from(EXIT_OK),
		Err(Error::Cancelled) => {
			eprintln!("{}", "Interrupted.".yellow());
			ExitCode::from(EXIT_INTERRUPTED)
		}
		Err(Error::Config { message }) => {
			eprintln!("{} {}", "Config error:".red().bold(), message);
			ExitCode::from(EXIT_CONFIG_ERROR)
		}
		Err(e) => {
			eprintln!("{} {}", "Error:".red().bold(), e);
			ExitCode::from(EXIT_FAILURE)
		}
	}
}

fn run(cli: &Cli, cancel: Arc<AtomicBool>) -> Result<(), Error> {
	let password = std::env::var("PASSWORD").ok().or_else(|| cli.password.clone());
	let overrides = Overrides { user: cli.user.clone(), password, threads: cli.threads, host: cli.host.clone(), port: cli.port };

	let config = raceforge_core::config::load_from_path(&cli.config, &overrides)?;
	let mut orchestrator = Orchestrator::new(config, cancel);

	if let Some(seed) = &cli.seed {
		match raceforge_core::totp::generate(seed) {
			Some(code) => orchestrator.context().set("__totp__", raceforge_core::context::Value::String(code)),
			None => tracing::warn!("--seed value is not valid base32; {{{{__totp__}}}} will be undefined"),
		}
	}

	let trace = orchestrator.run()?;
	report::print(&trace, orchestrator.metrics());
	Ok(())
}

fn init_logging(verbose: bool) {
	let filter = if verbose { "debug" } else { "info" };
	let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new(filter)).try_init();
}
