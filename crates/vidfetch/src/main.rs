#![allow(clippy::needless_return)]
#![warn(clippy::implicit_return)]

#[macro_use]
extern crate log;

pub use libvidfetch::Error;

mod clap_conf;
mod commands;
mod logger;
mod state;
mod utils;

use clap_conf::{
	CliDerive,
	SubCommands,
};

/// Main
fn main() -> Result<(), crate::Error> {
	let logger_handle = logger::setup_logger()?;

	let cli_matches = CliDerive::custom_parse();

	log::info!("CLI Verbosity is {}", cli_matches.verbosity);

	// apply cli "verbosity" argument to the log level
	let Some(spec) = logger::spec_for_verbosity(cli_matches.verbosity) else {
		return Err(crate::Error::other(
			"Expected verbosity integer range between 0 and 3 (inclusive)",
		));
	};
	logger_handle.set_new_spec(spec);

	colored::control::set_override(cli_matches.enable_colors());

	utils::setup_termination_handler()?;

	match &cli_matches.subcommands {
		SubCommands::Download(v) => commands::download::command_download(&cli_matches, v),
		SubCommands::Channel(v) => commands::channel::command_channel(&cli_matches, v),
		SubCommands::Cookies(v) => commands::cookies::command_cookies(&cli_matches, v),
		SubCommands::Deps(v) => commands::deps::command_deps(&cli_matches, v),
		SubCommands::Completions(v) => commands::completions::command_completions(&cli_matches, v),
	}?;

	return Ok(());
}
