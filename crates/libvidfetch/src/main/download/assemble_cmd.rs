use std::{
	ffi::OsString,
	path::Path,
};

use chrono::NaiveDate;

use crate::{
	data::video_info::VideoInfo,
	spawn::ArgsHelper,
	traits::download_options::DownloadOptions,
};

/// Bytes in one GB, as used for [`DownloadOptions::max_size_gb`]
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Format used for audio-only downloads
pub const AUDIO_FORMAT: &str = "bestaudio/best";
/// Format used when the estimated size is above the maximal size
pub const LIMITED_FORMAT: &str = "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[height<=1080]";
/// Format used when nothing limits the quality
pub const DEFAULT_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Assemble the arguments to fetch the metadata of a single media
pub fn assemble_metadata_command(cookie_args: &[OsString], url: &str) -> Vec<OsString> {
	let mut ytdl_args = ArgsHelper::new();

	ytdl_args.args(cookie_args.iter().cloned());
	ytdl_args.arg("--dump-json").arg("--no-playlist");
	ytdl_args.arg(url);

	return ytdl_args.into();
}

/// Get the format selector for a video download
///
/// A forced quality always wins, otherwise a estimated size above the maximal size limits to 1080p
pub fn format_string<A: DownloadOptions + ?Sized>(options: &A, info: Option<&VideoInfo>) -> String {
	if let Some(quality) = options.quality() {
		let h = quality.height();
		return format!("bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/best[height<={h}]");
	}

	let estimated = info.and_then(VideoInfo::estimated_size);

	if let Some(size) = estimated {
		let size_gb = size as f64 / BYTES_PER_GB;

		if size_gb > options.max_size_gb() {
			debug!(
				"Estimated size {:.2}GB is above the maximal {:.2}GB, limiting to 1080p",
				size_gb,
				options.max_size_gb()
			);
			return LIMITED_FORMAT.to_owned();
		}
	}

	return DEFAULT_FORMAT.to_owned();
}

/// Helper Function to assemble all ytdl command arguments for downloading a single media
/// Returns a list of arguments for youtube-dl in order
pub fn assemble_download_command<A: DownloadOptions + ?Sized>(
	options: &A,
	video_format: &str,
	cookie_args: &[OsString],
	output_dir: &Path,
	date: NaiveDate,
	url: &str,
) -> Vec<OsString> {
	let mut ytdl_args = ArgsHelper::new();

	debug!("YTDL Output dir is \"{}\"", output_dir.display());

	// date-prefixed output, the title is limited to 150 bytes to stay below common filename limits
	let output_format = output_dir.join(format!("{}_%(title).150B.%(ext)s", date.format("%Y-%m-%d")));

	ytdl_args.args(cookie_args.iter().cloned());

	if options.audio_only() {
		ytdl_args.arg("-f").arg(AUDIO_FORMAT);
		// always extract the audio, if it is not already audio-only
		ytdl_args.arg("-x");
		ytdl_args.arg("--audio-format").arg("mp3");
	} else {
		ytdl_args.arg("-f").arg(video_format);
		// merged formats should end up in a mp4 container
		ytdl_args.arg("--merge-output-format").arg("mp4");

		if options.embed_subs() {
			ytdl_args.arg("--write-subs");
			ytdl_args.arg("--embed-subs");
		}
	}

	// only ever download the single media, even if the url also references a playlist
	ytdl_args.arg("--no-playlist");

	add_prints(&mut ytdl_args);

	// ensure ytdl is printing progress reports, even with "--print" implying quiet
	ytdl_args.arg("--progress");
	// ensure ytdl prints the progress reports on a new line
	ytdl_args.arg("--newline");

	// "--print" would otherwise imply simulate
	ytdl_args.arg("--no-simulate");

	ytdl_args.arg("-o").arg(output_format);

	for extra_arg in options.extra_ytdl_arguments() {
		ytdl_args.arg(extra_arg);
	}

	// apply the url to download as the last argument
	ytdl_args.arg(url);

	return ytdl_args.into();
}

/// Add the custom print statements used for detecting different stages and information
fn add_prints(ytdl_args: &mut ArgsHelper) {
	ytdl_args
		.arg("--print")
		.arg("before_dl:PARSE_START '%(extractor)s' '%(id)s' %(title)s");

	// the final path after all post-processors ran
	ytdl_args
		.arg("--print")
		.arg("after_move:MOVE '%(extractor)s' '%(id)s' %(filepath)s");
}
