//! Module for converting downloaded media to a standard mp4 (h264 + aac)

use std::path::{
	Path,
	PathBuf,
};

use crate::{
	error::IOErrorToError,
	spawn::{
		CONVERT_TIMEOUT,
		ArgsHelper,
		ffmpeg::{
			FFMPEG_BIN_NAME,
			base_ffmpeg,
			ffprobe_streams,
		},
		is_not_found,
		wait_with_timeout,
	},
	utils::unique_path,
};

/// Suffix added to the stem of the temporary conversion output
const TEMP_SUFFIX: &str = ".vidfetch-convert";

/// Check if `file` is not already a mp4 with h264 video and aac audio
///
/// Returns [`None`] if ffprobe is not installed
/// If ffprobe fails for any other reason, conversion is assumed to be necessary
pub fn needs_conversion(file: &Path) -> Option<bool> {
	return match ffprobe_streams(file) {
		Ok(info) => Some(!info.is_standard_mp4()),
		Err(err) if is_not_found(&err) => None,
		Err(err) => {
			debug!("Probing \"{}\" failed, assuming it needs converting: {}", file.display(), err);
			Some(true)
		},
	};
}

/// Get the temporary sibling path used while converting `file`
fn temp_output_path(file: &Path) -> PathBuf {
	let stem = file.file_stem().map(|v| return v.to_string_lossy().to_string()).unwrap_or_default();

	return file.with_file_name(format!("{stem}{TEMP_SUFFIX}.mp4"));
}

/// Get the final path of the converted `file`, which is `<stem>.mp4` beside it
fn final_output_path(file: &Path) -> PathBuf {
	return file.with_extension("mp4");
}

/// Transcode `input` into `output` as h264 + aac
pub fn convert_to_mp4(input: &Path, output: &Path) -> Result<(), crate::Error> {
	let mut args = ArgsHelper::new();
	args.arg("-i")
		.arg(input)
		.arg("-c:v")
		.arg("libx264")
		.arg("-c:a")
		.arg("aac")
		.arg(output);

	let res = wait_with_timeout(base_ffmpeg(true, args.into_inner()), CONVERT_TIMEOUT, FFMPEG_BIN_NAME)?;

	if !res.success {
		let last_line = res.stderr.lines().last().unwrap_or_default().trim().to_owned();

		return Err(crate::Error::command_unsuccessful(format!(
			"FFMPEG did not successfully exit: {last_line}"
		)));
	}

	return Ok(());
}

/// Convert `file` to a standard mp4 if it is not one already
///
/// The conversion is written to a temporary sibling first, which then replaces the original as `<stem>.mp4`
/// Returns the new path if a conversion happened, [`None`] if nothing needed to be done or ffprobe / ffmpeg are missing
pub fn convert_if_needed(file: &Path) -> Result<Option<PathBuf>, crate::Error> {
	match needs_conversion(file) {
		None => {
			warn!("ffprobe is not installed, skipping conversion of \"{}\"", file.display());
			return Ok(None);
		},
		Some(false) => {
			debug!("\"{}\" is already a standard mp4", file.display());
			return Ok(None);
		},
		Some(true) => (),
	}

	let temp = temp_output_path(file);
	info!("Converting \"{}\" to mp4", file.display());

	if let Err(err) = convert_to_mp4(file, &temp) {
		// dont leave a half-written file behind
		if temp.exists() {
			std::fs::remove_file(&temp).attach_path_err(&temp)?;
		}

		if is_not_found(&err) {
			warn!("ffmpeg is not installed, skipping conversion of \"{}\"", file.display());
			return Ok(None);
		}

		return Err(err);
	}

	std::fs::remove_file(file).attach_path_err(file)?;

	let target = unique_path(final_output_path(file))
		.ok_or_else(|| return crate::Error::other("Could not find a free path for the converted file"))?;
	std::fs::rename(&temp, &target).attach_path_err(&target)?;

	return Ok(Some(target));
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_temp_output_path() {
		assert_eq!(
			PathBuf::from("/out/2024-01-01_Title.vidfetch-convert.mp4"),
			temp_output_path(Path::new("/out/2024-01-01_Title.webm"))
		);
		assert_eq!(
			PathBuf::from("/out/a.b.vidfetch-convert.mp4"),
			temp_output_path(Path::new("/out/a.b.mkv"))
		);
	}

	#[test]
	fn test_final_output_path() {
		assert_eq!(PathBuf::from("/out/Title.mp4"), final_output_path(Path::new("/out/Title.webm")));
		assert_eq!(PathBuf::from("/out/Title.mp4"), final_output_path(Path::new("/out/Title.mp4")));
	}

	#[test]
	#[ignore = "CI Install not present currently"]
	fn test_convert_generated_video() {
		let tmp = tempfile::Builder::new()
			.prefix("vidfetch-test-convert")
			.tempdir()
			.expect("Expected a temp dir to be created");
		let input = tmp.path().join("input.mkv");

		let generated = wait_with_timeout(
			base_ffmpeg(
				true,
				[
					"-f",
					"lavfi",
					"-i",
					"testsrc=duration=1:size=64x64:rate=10",
					"-c:v",
					"mpeg4",
					input.to_str().expect("Expected a utf8 path"),
				],
			),
			CONVERT_TIMEOUT,
			"ffmpeg",
		)
		.expect("Expected ffmpeg to run");
		assert!(generated.success);

		let converted = convert_if_needed(&input)
			.expect("Expected conversion to work")
			.expect("Expected a conversion to happen");

		assert_eq!(tmp.path().join("input.mp4"), converted);
		assert!(converted.exists());
		assert!(!input.exists());
	}
}
