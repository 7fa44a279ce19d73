//! Module that contains all logic for spawning the "ffmpeg" and "ffprobe" commands

use std::{
	ffi::OsString,
	path::Path,
	sync::LazyLock,
};

use regex::Regex;
use serde::Deserialize;

use super::{
	ArgsHelper,
	METADATA_TIMEOUT,
	VERSION_TIMEOUT,
	wait_with_timeout,
};

/// Binary name to spawn for the ffmpeg process
pub const FFMPEG_BIN_NAME: &str = "ffmpeg";
/// Binary name to spawn for the ffprobe process
pub const FFPROBE_BIN_NAME: &str = "ffprobe";

/// Create a new [FFMPEG_BIN_NAME] [duct::Expression] with the given arguments
/// `overwrite` adds `-y`, interactive mode is always disabled
#[inline]
#[must_use]
pub fn base_ffmpeg<I, U>(overwrite: bool, args: I) -> duct::Expression
where
	I: IntoIterator<Item = U>,
	U: Into<OsString>,
{
	let mut full_args = ArgsHelper::new();

	if overwrite {
		full_args.arg("-y"); // always overwrite output path
	}

	// explicitly disable interactive mode
	full_args.arg("-nostdin");
	full_args.args(args);

	return duct::cmd(FFMPEG_BIN_NAME, full_args.into_inner());
}

/// Create a new [FFPROBE_BIN_NAME] [duct::Expression] with the given arguments
#[inline]
#[must_use]
pub fn base_ffprobe<I, U>(args: I) -> duct::Expression
where
	I: IntoIterator<Item = U>,
	U: Into<OsString>,
{
	return duct::cmd(FFPROBE_BIN_NAME, args);
}

/// Regex to parse the version from a "ffmpeg -version" or "ffprobe -version" output
/// cap1: version
static FFMPEG_VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	return Regex::new(r"(?mi)^ff(?:mpeg|probe) version ([a-z0-9.\-_+~]+)").unwrap();
});

/// Get Version of `ffmpeg`
#[inline]
pub fn ffmpeg_version() -> Result<String, crate::Error> {
	let output = wait_with_timeout(base_ffmpeg(false, ["-version"]), VERSION_TIMEOUT, FFMPEG_BIN_NAME)?;

	if !output.success {
		return Err(crate::Error::command_unsuccessful("FFMPEG did not successfully exit!"));
	}

	return ffmpeg_parse_version(&output.stdout);
}

/// Get Version of `ffprobe`
#[inline]
pub fn ffprobe_version() -> Result<String, crate::Error> {
	let output = wait_with_timeout(base_ffprobe(["-version"]), VERSION_TIMEOUT, FFPROBE_BIN_NAME)?;

	if !output.success {
		return Err(crate::Error::command_unsuccessful("FFPROBE did not successfully exit!"));
	}

	return ffmpeg_parse_version(&output.stdout);
}

/// Internal Function to parse the input to a ffmpeg version with regex
#[inline]
fn ffmpeg_parse_version(input: &str) -> Result<String, crate::Error> {
	return Ok(FFMPEG_VERSION_REGEX
		.captures_iter(input)
		.next()
		.ok_or_else(|| return crate::Error::no_captures("FFMPEG Version could not be determined"))?[1]
		.to_owned());
}

/// Single stream as reported by ffprobe
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProbeStream {
	/// Stream type, like "video" or "audio"
	#[serde(default)]
	pub codec_type: Option<String>,
	/// Codec name, like "h264" or "aac"
	#[serde(default)]
	pub codec_name: Option<String>,
}

/// Container information as reported by ffprobe
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ProbeFormat {
	/// Comma-separated list of format names, like "mov,mp4,m4a,3gp,3g2,mj2"
	#[serde(default)]
	pub format_name: String,
}

/// Result of [`ffprobe_streams`]
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ProbeInfo {
	#[serde(default)]
	pub streams: Vec<ProbeStream>,
	#[serde(default)]
	pub format:  ProbeFormat,
}

impl ProbeInfo {
	/// Get all codec names of streams with the given type
	fn codecs_of<'a>(&'a self, codec_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
		return self
			.streams
			.iter()
			.filter(move |v| return v.codec_type.as_deref() == Some(codec_type))
			.map(|v| return v.codec_name.as_deref().unwrap_or_default());
	}

	/// Check if the container is a mp4 with h264 video and aac audio
	/// Media missing either a video or a audio stream is not considered standard
	pub fn is_standard_mp4(&self) -> bool {
		let is_mp4 = self.format.format_name.split(',').any(|v| return v.trim() == "mp4");

		let mut video = self.codecs_of("video").peekable();
		let has_video = video.peek().is_some();
		let is_h264 = has_video && video.all(|v| return v.eq_ignore_ascii_case("h264"));

		let mut audio = self.codecs_of("audio").peekable();
		let has_audio = audio.peek().is_some();
		let is_aac = has_audio && audio.all(|v| return v.eq_ignore_ascii_case("aac"));

		return is_mp4 && is_h264 && is_aac;
	}
}

/// Parse the json output of ffprobe
pub fn parse_probe_json(input: &str) -> Result<ProbeInfo, crate::Error> {
	return Ok(serde_json::from_str(input)?);
}

/// Get the container format and streams of `file` with ffprobe
pub fn ffprobe_streams<P: AsRef<Path>>(file: P) -> Result<ProbeInfo, crate::Error> {
	let file = file.as_ref();

	let mut args = ArgsHelper::new();
	args.arg("-v")
		.arg("error")
		.arg("-show_entries")
		.arg("stream=codec_name,codec_type")
		.arg("-show_entries")
		.arg("format=format_name")
		.arg("-of")
		.arg("json")
		.arg(file);

	let output = wait_with_timeout(base_ffprobe(args.into_inner()), METADATA_TIMEOUT, FFPROBE_BIN_NAME)?;

	if !output.success {
		return Err(crate::Error::command_unsuccessful(format!(
			"ffprobe failed for \"{}\": {}",
			file.display(),
			output.stderr.trim()
		)));
	}

	return parse_probe_json(&output.stdout);
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_ffmpeg_parse_version_invalid_input() {
		assert_eq!(
			ffmpeg_parse_version("hello"),
			Err(crate::Error::no_captures("FFMPEG Version could not be determined"))
		);
	}

	#[test]
	fn test_ffmpeg_parse_version_valid_static_input() {
		let ffmpeg_output = "ffmpeg version n4.4.1 Copyright (c) 2000-2021 the FFmpeg developers
built with gcc 11.1.0 (GCC)
libavutil      56. 70.100 / 56. 70.100
";

		assert_eq!(ffmpeg_parse_version(ffmpeg_output), Ok("n4.4.1".to_owned()));

		let ffprobe_output = "ffprobe version 6.1.1-3ubuntu5 Copyright (c) 2007-2023 the FFmpeg developers\n";
		assert_eq!(ffmpeg_parse_version(ffprobe_output), Ok("6.1.1-3ubuntu5".to_owned()));
	}

	#[test]
	fn test_probe_standard_mp4() {
		let input = r#"{
	"programs": [],
	"streams": [
		{ "codec_name": "h264", "codec_type": "video" },
		{ "codec_name": "aac", "codec_type": "audio" }
	],
	"format": { "format_name": "mov,mp4,m4a,3gp,3g2,mj2" }
}"#;

		let info = parse_probe_json(input).expect("Expected valid json to parse");
		assert_eq!(2, info.streams.len());
		assert!(info.is_standard_mp4());
	}

	#[test]
	fn test_probe_needs_conversion() {
		// webm container
		let input = r#"{"streams":[{"codec_name":"vp9","codec_type":"video"},{"codec_name":"opus","codec_type":"audio"}],"format":{"format_name":"matroska,webm"}}"#;
		assert!(!parse_probe_json(input).unwrap().is_standard_mp4());

		// mp4 with a different video codec
		let input = r#"{"streams":[{"codec_name":"hevc","codec_type":"video"},{"codec_name":"aac","codec_type":"audio"}],"format":{"format_name":"mov,mp4,m4a,3gp,3g2,mj2"}}"#;
		assert!(!parse_probe_json(input).unwrap().is_standard_mp4());

		// mp4 without audio
		let input = r#"{"streams":[{"codec_name":"h264","codec_type":"video"}],"format":{"format_name":"mov,mp4,m4a,3gp,3g2,mj2"}}"#;
		assert!(!parse_probe_json(input).unwrap().is_standard_mp4());

		// missing everything
		assert!(!parse_probe_json("{}").unwrap().is_standard_mp4());
	}

	#[test]
	#[ignore = "CI Install not present currently"]
	fn test_ffmpeg_spawn() {
		assert!(ffmpeg_version().is_ok());
	}
}
