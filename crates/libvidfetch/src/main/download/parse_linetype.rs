use std::{
	path::PathBuf,
	sync::LazyLock,
};

use regex::Regex;

/// Markers printed through "--print", see [`LineType::Custom`]
#[derive(Debug, PartialEq, Clone)]
pub enum CustomParseType {
	/// Printed before the download starts
	/// values: (extractor, id, title)
	Start(String, String, String),
	/// Printed after all post-processing, with the final file path
	/// values: (extractor, id, final path)
	Move(String, String, PathBuf),
}

/// Kind of a single yt-dlp output line (stderr is merged into stdout)
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LineType {
	/// Merging or converting through ffmpeg
	Ffmpeg,
	/// "[download]" lines, including the progress
	Download,
	/// Lines of a extractor, like "[youtube]" or "[BiliBili]"
	ProviderSpecific,
	/// Lines without a prefix, like "Deleting original file"
	Generic,
	/// Markers from "--print"
	Custom,
	/// Error lines, the last one is used as the failure message
	Error,
	/// Warning lines, only logged
	Warning,
}

impl LineType {
	/// Classify a output line
	/// Returns [`None`] for lines that do not match any kind
	pub fn try_from_line(input: &str) -> Option<Self> {
		/// Prefix of the form "[name]", cap1: name
		static BASIC_TYPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
			return Regex::new(r"(?mi)^\[([\da-z:_]*)\]").unwrap();
		});
		/// Unprefixed lines that are still expected
		static GENERIC_TYPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
			return Regex::new(r"(?mi)^deleting original file").unwrap();
		});

		if let Some(cap) = BASIC_TYPE_REGEX.captures(input) {
			let name = cap[1].to_lowercase();

			if name == "download" {
				return Some(Self::Download);
			}

			if name == "ffmpeg" || name.starts_with("merger") || name.starts_with("videoconvertor") {
				return Some(Self::Ffmpeg);
			}

			// any other prefix is a extractor name
			return Some(Self::ProviderSpecific);
		}

		if input.starts_with("PARSE_START") || input.starts_with("MOVE") {
			return Some(Self::Custom);
		}

		if GENERIC_TYPE_REGEX.is_match(input) {
			return Some(Self::Generic);
		}

		if input.starts_with("ERROR:") || input.starts_with("yt-dlp: error:") {
			return Some(Self::Error);
		}

		if input.starts_with("WARNING:") {
			return Some(Self::Warning);
		}

		return None;
	}

	/// Get the whole percent of a download progress line
	/// Returns [`None`] for other variants, lines without a percentage and values above 100
	pub fn try_get_download_percent<I: AsRef<str>>(&self, input: I) -> Option<u8> {
		if self != &Self::Download {
			return None;
		}

		/// cap1: whole percent, decimals are ignored
		static DOWNLOAD_PERCENTAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
			return Regex::new(r"(?mi)^\[download\]\s+(\d{1,3})(?:\.\d)?%").unwrap();
		});

		let cap = DOWNLOAD_PERCENTAGE_REGEX.captures(input.as_ref())?;

		return cap[1].parse::<u8>().ok().filter(|v| return *v <= 100);
	}

	/// Parse a "--print" marker
	/// Returns [`None`] for other variants and unknown markers
	pub fn try_get_parse_helper<I: AsRef<str>>(&self, input: I) -> Option<CustomParseType> {
		if self != &Self::Custom {
			return None;
		}

		/// cap1: extractor, cap2: id, cap3: title (may be empty)
		static PARSE_START_REGEX: LazyLock<Regex> = LazyLock::new(|| {
			return Regex::new(r"(?m)^PARSE_START '([^']+)' '([^']+)'(?: (.*))?$").unwrap();
		});
		/// cap1: extractor, cap2: id, cap3: path
		static PARSE_MOVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
			return Regex::new(r"(?m)^MOVE '([^']+)' '([^']+)' (.+)$").unwrap();
		});

		let input = input.as_ref();

		if let Some(cap) = PARSE_START_REGEX.captures(input) {
			let title = cap.get(3).map_or("", |v| return v.as_str());

			return Some(CustomParseType::Start(
				cap[1].to_owned(),
				cap[2].to_owned(),
				title.to_owned(),
			));
		}

		if let Some(cap) = PARSE_MOVE_REGEX.captures(input) {
			return Some(CustomParseType::Move(
				cap[1].to_owned(),
				cap[2].to_owned(),
				PathBuf::from(&cap[3]),
			));
		}

		return None;
	}
}
