#![allow(missing_docs)]

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use varcodec::variant::VariantError;

mod cmd;

#[derive(Parser)]
#[command(name = "varcodec", about = "OLE Automation VARIANT inspection tools")]
struct Cli {
	/// Increase log verbosity (-v debug, -vv trace).
	#[arg(short, long, action = ArgAction::Count, global = true)]
	verbose: u8,
	/// Disable logging.
	#[arg(short, long, global = true, conflicts_with = "verbose")]
	quiet: bool,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	Info(cmd::info::Args),
	Decode(cmd::decode::Args),
	Tag(cmd::tag::Args),
	Clear(cmd::clear::Args),
}

fn main() {
	let cli = Cli::parse();
	init_logging(cli.verbose, cli.quiet);

	if let Err(err) = run(cli.command) {
		report(&err);
		std::process::exit(1);
	}
}

fn run(command: Commands) -> varcodec::variant::Result<()> {
	match command {
		Commands::Info(args) => cmd::info::run(args),
		Commands::Decode(args) => cmd::decode::run(args),
		Commands::Tag(args) => cmd::tag::run(args),
		Commands::Clear(args) => cmd::clear::run(args),
	}
}

fn init_logging(verbose: u8, quiet: bool) {
	if quiet {
		return;
	}

	let level = match verbose {
		0 => Level::WARN,
		1 => Level::DEBUG,
		_ => Level::TRACE,
	};
	let subscriber = FmtSubscriber::builder().with_max_level(level).with_writer(std::io::stderr).finish();
	if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
		eprintln!("warning: logging disabled: {err}");
	}
}

fn report(err: &VariantError) {
	eprintln!("error: {err}");
	eprintln!("category: {}", err.category().as_str());
	if let Some(tag) = err.raw_tag() {
		eprintln!("raw_tag: 0x{:04x}", tag.raw());
	}
}
