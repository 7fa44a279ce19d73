//! Module for Clap related structs (derived)

#![deny(missing_docs)] // comments are used for "--help" generation, so it should always be defined

use clap::{
	ArgAction,
	Args,
	CommandFactory,
	Parser,
	Subcommand,
	ValueHint,
	error::ErrorKind,
};
use is_terminal::IsTerminal;
use libvidfetch::{
	chrono::NaiveDate,
	main::{
		channel::{
			ChannelFilter,
			parse_filter_date,
		},
		cookies::{
			Browser,
			CookieSource,
			CookieStore,
		},
	},
	traits::download_options::Quality,
	utils::resolve_path_alias,
};
use std::{
	ffi::OsString,
	path::PathBuf,
	time::Duration,
};

/// Trait to check and transform all Command Structures
trait Check {
	/// Check and transform self to be correct
	fn check(&mut self) -> Result<(), crate::Error>;
}

#[derive(Debug, Parser, Clone, PartialEq)]
#[command(author, version = env!("VIDFETCH_VERSION"), about, long_about = None)]
#[command(bin_name("vidfetch"))]
#[command(args_override_self(true))] // specifying a argument multiple times overwrites the earlier ones
#[command(disable_help_subcommand(true))] // Disable subcommand "help", only "-h --help" should be used
#[command(subcommand_negates_reqs(true))]
pub struct CliDerive {
	/// Set Logging verbosity (0 - Default - WARN, 1 - INFO, 2 - DEBUG, 3 - TRACE)
	#[arg(short, long, action = ArgAction::Count, env = "VIDFETCH_VERBOSITY")]
	pub verbosity:    u8,
	/// Explicitly set interactive / not interactive
	#[arg(long = "interactive")]
	pub explicit_tty: Option<bool>,
	/// Force Color to be active in any mode
	#[arg(long = "color")]
	pub force_color:  bool,

	#[command(subcommand)]
	pub subcommands: SubCommands,
}

impl CliDerive {
	/// Execute clap::Parser::parse and apply custom validation and transformation logic
	#[must_use]
	pub fn custom_parse() -> Self {
		let mut parsed = Self::parse();

		if let Err(err) = Check::check(&mut parsed) {
			Self::command().error(ErrorKind::ValueValidation, err).exit();
		}

		return parsed;
	}

	/// Get if the mode is interactive or not
	#[must_use]
	pub fn is_interactive(&self) -> bool {
		if let Some(explicit) = self.explicit_tty {
			return explicit;
		}

		return std::io::stdout().is_terminal() && std::io::stdin().is_terminal();
	}

	/// Get if the colors are enabled or not
	#[must_use]
	pub fn enable_colors(&self) -> bool {
		return self.force_color | self.is_interactive();
	}
}

impl Check for CliDerive {
	fn check(&mut self) -> Result<(), crate::Error> {
		return Check::check(&mut self.subcommands);
	}
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum SubCommands {
	/// Download one or more URLs, multiple URLs are downloaded as a batch
	Download(CommandDownload),
	/// Download (a selection of) all videos of a channel
	Channel(CommandChannel),
	/// Manage saved cookie files
	Cookies(CommandCookies),
	/// Check (and optionally install) the required external programs
	Deps(CommandDeps),
	/// Generate shell completions
	Completions(CommandCompletions),
}

impl Check for SubCommands {
	fn check(&mut self) -> Result<(), crate::Error> {
		match self {
			SubCommands::Download(v) => return Check::check(v),
			SubCommands::Channel(v) => return Check::check(v),
			SubCommands::Cookies(v) => return Check::check(v),
			SubCommands::Deps(v) => return Check::check(v),
			SubCommands::Completions(v) => return Check::check(v),
		}
	}
}

/// Options shared by all commands that download media
#[derive(Debug, Args, Clone, PartialEq)]
pub struct DownloadArgs {
	/// Output directory, aliases like "documents" or "桌面" are resolved
	#[arg(short, long = "output", env = "VIDFETCH_OUT", default_value = "~/Downloads/videos", value_hint = ValueHint::DirPath)]
	pub output_path:            PathBuf,
	/// Download audio only (mp3)
	#[arg(short = 'a', long = "audio-only")]
	pub audio_only_enable:      bool,
	/// Force a maximal quality, by default it is decided by the estimated size
	#[arg(short, long, value_parser = parse_quality)]
	pub quality:                Option<Quality>,
	/// Disable downloading and embedding subtitles
	#[arg(long = "no-subs")]
	pub no_subs:                bool,
	/// Disable converting media to mp4 (h264 + aac)
	#[arg(short = 'n', long = "no-convert")]
	pub no_convert:             bool,
	/// Estimated size in GB above which the automatic quality is limited to 1080p
	#[arg(short = 'm', long = "max-size", default_value_t = 2.0)]
	pub max_size_gb:            f64,
	/// Amount of downloads to run at the same time
	#[arg(long, env = "VIDFETCH_PARALLEL", default_value_t = 1)]
	pub parallel:               usize,
	/// Extract cookies from the given browser
	#[arg(long, value_parser = parse_browser, conflicts_with_all = ["cookies_file", "no_cookies"])]
	pub cookies_from_browser:   Option<Browser>,
	/// Use the given Netscape cookie file
	#[arg(long = "cookies", value_hint = ValueHint::FilePath, conflicts_with = "no_cookies")]
	pub cookies_file:           Option<PathBuf>,
	/// Never use any cookies, not even saved ones
	#[arg(long)]
	pub no_cookies:             bool,
	/// Directory of saved cookie files, defaults to the config directory
	#[arg(long, env = "VIDFETCH_COOKIES_DIR", value_hint = ValueHint::DirPath)]
	pub cookies_dir:            Option<PathBuf>,
	/// Extra arguments to pass to yt-dlp, "key value" pairs are split once
	#[arg(long = "extra-ytdl-arg")]
	pub extra_ytdl_args:        Vec<String>,
	/// Print yt-dlp stdout
	/// This will still require logging verbosity set to 3 or "RUST_LOG=trace"
	#[arg(long = "youtubedl-stdout")]
	pub print_youtubedl_stdout: bool,
}

impl DownloadArgs {
	/// Get where cookies should come from
	#[must_use]
	pub fn cookie_source(&self) -> CookieSource {
		if self.no_cookies {
			return CookieSource::Disabled;
		}
		if let Some(file) = &self.cookies_file {
			return CookieSource::File(file.clone());
		}
		if let Some(browser) = self.cookies_from_browser {
			return CookieSource::Browser(browser);
		}

		return CookieSource::None;
	}

	/// Get the store of saved cookie files
	#[must_use]
	pub fn cookie_store(&self) -> Option<CookieStore> {
		return cookie_store_in(self.cookies_dir.as_ref());
	}

	/// Get the extra yt-dlp arguments, split into separate arguments
	#[must_use]
	pub fn extra_arguments(&self) -> Vec<OsString> {
		return self
			.extra_ytdl_args
			.iter()
			.flat_map(|v| {
				if let Some((split1, split2)) = v.split_once(' ') {
					return Vec::from([OsString::from(split1), OsString::from(split2)]);
				}
				return Vec::from([OsString::from(v)]);
			})
			.collect();
	}
}

impl Check for DownloadArgs {
	fn check(&mut self) -> Result<(), crate::Error> {
		self.output_path = resolve_path_alias(&self.output_path);

		if self.parallel == 0 {
			return Err(crate::Error::other("\"--parallel\" has to be at least 1"));
		}

		if self.max_size_gb.is_nan() || self.max_size_gb <= 0.0 {
			return Err(crate::Error::other("\"--max-size\" has to be above 0"));
		}

		if let Some(file) = &self.cookies_file {
			if !file.is_file() {
				return Err(crate::Error::not_a_file("Cookie file does not exist", file));
			}
		}

		return Ok(());
	}
}

/// Get the cookie store in `dir`, or in the default directory
fn cookie_store_in(dir: Option<&PathBuf>) -> Option<CookieStore> {
	return dir
		.cloned()
		.or_else(CookieStore::default_dir)
		.map(CookieStore::new);
}

/// Parse a quality for clap
fn parse_quality(input: &str) -> Result<Quality, String> {
	return input.parse::<Quality>().map_err(|err| return err.to_string());
}

/// Parse a browser for clap
fn parse_browser(input: &str) -> Result<Browser, String> {
	return input.parse::<Browser>().map_err(|err| return err.to_string());
}

/// Parse a filter date for clap
fn parse_date(input: &str) -> Result<NaiveDate, String> {
	return parse_filter_date(input).map_err(|err| return err.to_string());
}

/// Download the given URL(s)
#[derive(Debug, Parser, Clone, PartialEq)]
pub struct CommandDownload {
	#[command(flatten)]
	pub options: DownloadArgs,

	/// The URL(s) to download
	#[arg(required = true, value_hint = ValueHint::Url)]
	pub urls: Vec<String>,
}

impl Check for CommandDownload {
	fn check(&mut self) -> Result<(), crate::Error> {
		self.urls = self
			.urls
			.iter()
			.map(|v| return v.trim().to_owned())
			.filter(|v| return !v.is_empty())
			.collect();

		if self.urls.is_empty() {
			return Err(crate::Error::other("At least one URL is required"));
		}

		return Check::check(&mut self.options);
	}
}

/// Download videos of a channel
#[derive(Debug, Parser, Clone, PartialEq)]
pub struct CommandChannel {
	#[command(flatten)]
	pub options: DownloadArgs,

	/// Only download the latest COUNT videos (after the other filters)
	#[arg(long, conflicts_with = "all")]
	pub count:       Option<usize>,
	/// Download all videos (that match the other filters)
	#[arg(long)]
	pub all:         bool,
	/// Only download videos with at least this many views
	#[arg(long)]
	pub min_views:   Option<u64>,
	/// Only download videos uploaded on or after this date (YYYY-MM-DD)
	#[arg(long, value_parser = parse_date)]
	pub date_after:  Option<NaiveDate>,
	/// Only download videos uploaded on or before this date (YYYY-MM-DD)
	#[arg(long, value_parser = parse_date)]
	pub date_before: Option<NaiveDate>,
	/// Resume the previous download of this channel
	#[arg(long)]
	pub resume:      bool,
	/// Initial delay in seconds between requests, adjusted automatically
	#[arg(long, default_value_t = 3.0)]
	pub delay:       f64,

	/// The channel URL
	#[arg(value_hint = ValueHint::Url)]
	pub url: String,
}

impl CommandChannel {
	/// Get the filter given through arguments
	/// Returns [`None`] when no selection was made and the user should be asked
	#[must_use]
	pub fn selection(&self) -> Option<ChannelFilter> {
		let filter = ChannelFilter {
			count:       if self.all { None } else { self.count },
			date_after:  self.date_after,
			date_before: self.date_before,
			min_views:   self.min_views,
		};

		if self.all || !filter.is_empty() {
			return Some(filter);
		}

		return None;
	}

	/// Get the initial delay between requests
	#[must_use]
	pub fn initial_delay(&self) -> Duration {
		return Duration::from_secs_f64(self.delay);
	}
}

impl Check for CommandChannel {
	fn check(&mut self) -> Result<(), crate::Error> {
		self.url = self.url.trim().to_owned();

		if self.url.is_empty() {
			return Err(crate::Error::other("A channel URL is required"));
		}

		if self.count == Some(0) {
			return Err(crate::Error::other("\"--count\" has to be at least 1"));
		}

		if !self.delay.is_finite() || self.delay < 0.0 {
			return Err(crate::Error::other("\"--delay\" has to be a positive amount of seconds"));
		}

		if let (Some(after), Some(before)) = (self.date_after, self.date_before) {
			if after > before {
				return Err(crate::Error::other("\"--date-after\" has to be before \"--date-before\""));
			}
		}

		return Check::check(&mut self.options);
	}
}

/// Manage saved cookie files
#[derive(Debug, Parser, Clone, PartialEq)]
pub struct CommandCookies {
	/// Directory of saved cookie files, defaults to the config directory
	#[arg(long, env = "VIDFETCH_COOKIES_DIR", value_hint = ValueHint::DirPath)]
	pub cookies_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub subcommands: CookiesSubCommands,
}

impl CommandCookies {
	/// Get the store of saved cookie files
	#[must_use]
	pub fn cookie_store(&self) -> Option<CookieStore> {
		return cookie_store_in(self.cookies_dir.as_ref());
	}
}

impl Check for CommandCookies {
	fn check(&mut self) -> Result<(), crate::Error> {
		return Check::check(&mut self.subcommands);
	}
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum CookiesSubCommands {
	/// List all saved cookie files
	List,
	/// Import a Netscape cookie file for a site
	Import(CookiesImport),
	/// Remove the saved cookie file of a site
	Remove(CookiesRemove),
}

impl Check for CookiesSubCommands {
	fn check(&mut self) -> Result<(), crate::Error> {
		match self {
			CookiesSubCommands::List => return Ok(()),
			CookiesSubCommands::Import(v) => return Check::check(v),
			CookiesSubCommands::Remove(v) => return Check::check(v),
		}
	}
}

/// Import a Netscape cookie file
#[derive(Debug, Parser, Clone, PartialEq)]
pub struct CookiesImport {
	/// The Netscape cookie file to import
	#[arg(value_hint = ValueHint::FilePath)]
	pub file_path: PathBuf,
	/// The domain the cookies are for (like "bilibili.com")
	pub domain:    String,
}

impl Check for CookiesImport {
	fn check(&mut self) -> Result<(), crate::Error> {
		self.domain = self.domain.trim().to_owned();

		if self.domain.is_empty() {
			return Err(crate::Error::other("Cookie domain may not be empty"));
		}

		return Ok(());
	}
}

/// Remove a saved cookie file
#[derive(Debug, Parser, Clone, PartialEq)]
pub struct CookiesRemove {
	/// The domain to remove the cookies of (like "bilibili.com")
	pub domain: String,
}

impl Check for CookiesRemove {
	fn check(&mut self) -> Result<(), crate::Error> {
		self.domain = self.domain.trim().to_owned();

		return Ok(());
	}
}

/// Check the external programs
#[derive(Debug, Parser, Clone, PartialEq)]
pub struct CommandDeps {
	/// Try to install missing programs
	#[arg(long)]
	pub install: bool,
}

impl Check for CommandDeps {
	fn check(&mut self) -> Result<(), crate::Error> {
		return Ok(());
	}
}

/// Generate shell completions
#[derive(Debug, Parser, Clone, PartialEq)]
pub struct CommandCompletions {
	/// The shell to generate completions for
	#[arg(value_enum)]
	pub shell:            clap_complete::Shell,
	/// Output file to write the completions to, by default they are written to STDOUT
	#[arg(short = 'o', long = "out", value_hint = ValueHint::FilePath)]
	pub output_file_path: Option<PathBuf>,
}

impl Check for CommandCompletions {
	fn check(&mut self) -> Result<(), crate::Error> {
		return Ok(());
	}
}
