//! Module for State Struct for all commands

use std::{
	ffi::{
		OsStr,
		OsString,
	},
	path::{
		Path,
		PathBuf,
	},
};

use libvidfetch::{
	main::cookies::{
		CookieSource,
		CookieStore,
	},
	traits::download_options::{
		DownloadOptions,
		Quality,
	},
};

use crate::clap_conf::DownloadArgs;

/// Struct to keep configuration data for the [`DownloadOptions`] trait
///
/// This data does not change between URLs, so one instance is shared by all workers of a batch
#[derive(Debug, PartialEq, Clone)]
pub struct DownloadState {
	/// Enable downloading / converting to audio only format
	audio_only_enable:       bool,
	/// Forced maximal quality
	quality:                 Option<Quality>,
	/// Download and embed subtitles
	embed_subs:              bool,
	/// Convert non-standard media to mp4
	convert:                 bool,
	/// Size in GB above which the automatic quality is limited
	max_size_gb:             f64,
	/// The Path to download to
	download_path:           PathBuf,
	/// Where cookies come from
	cookie_source:           CookieSource,
	/// Saved cookie files
	cookie_store:            Option<CookieStore>,
	/// Extra arguments to pass to ytdl
	extra_command_arguments: Vec<OsString>,
	/// Print youtube-dl stdout as trace logs
	print_command_log:       bool,
}

impl DownloadState {
	/// Create a new instance of [`DownloadState`] from the cli options
	/// `convert` should be `false` when ffmpeg is not available
	pub fn new(args: &DownloadArgs, download_path: PathBuf, convert: bool) -> Self {
		return Self {
			audio_only_enable: args.audio_only_enable,
			quality: args.quality,
			embed_subs: !args.no_subs,
			convert: convert && !args.no_convert,
			max_size_gb: args.max_size_gb,
			download_path,
			cookie_source: args.cookie_source(),
			cookie_store: args.cookie_store(),
			extra_command_arguments: args.extra_arguments(),
			print_command_log: args.print_youtubedl_stdout,
		};
	}
}

impl DownloadOptions for DownloadState {
	fn audio_only(&self) -> bool {
		return self.audio_only_enable;
	}

	fn quality(&self) -> Option<Quality> {
		return self.quality;
	}

	fn embed_subs(&self) -> bool {
		return self.embed_subs;
	}

	fn convert(&self) -> bool {
		return self.convert;
	}

	fn max_size_gb(&self) -> f64 {
		return self.max_size_gb;
	}

	fn download_path(&self) -> &Path {
		return &self.download_path;
	}

	fn cookie_source(&self) -> &CookieSource {
		return &self.cookie_source;
	}

	fn cookie_store(&self) -> Option<&CookieStore> {
		return self.cookie_store.as_ref();
	}

	fn extra_ytdl_arguments(&self) -> Vec<&OsStr> {
		return self.extra_command_arguments.iter().map(OsString::as_os_str).collect();
	}

	fn print_command_log(&self) -> bool {
		return self.print_command_log;
	}
}
