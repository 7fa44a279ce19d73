//! Module for the information "yt-dlp --dump-json" outputs for a single media

use std::collections::HashMap;

use serde::Deserialize;

/// A single format entry of [VideoInfo]
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct FormatEntry {
	#[serde(default)]
	pub format_id:       Option<String>,
	#[serde(default)]
	pub ext:             Option<String>,
	#[serde(default)]
	pub height:          Option<u32>,
	/// Exact size in bytes, if known
	#[serde(default)]
	pub filesize:        Option<f64>,
	/// Estimated size in bytes, if known
	#[serde(default)]
	pub filesize_approx: Option<f64>,
}

impl FormatEntry {
	/// Get the best known size of this format
	fn size(&self) -> Option<f64> {
		return self.filesize.or(self.filesize_approx);
	}
}

/// Information about a single media
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct VideoInfo {
	#[serde(default)]
	pub id:        String,
	#[serde(default)]
	pub title:     Option<String>,
	/// Duration in seconds
	#[serde(default)]
	pub duration:  Option<f64>,
	#[serde(default)]
	pub formats:   Vec<FormatEntry>,
	/// Subtitles by language, the inner values are not used
	#[serde(default)]
	pub subtitles: HashMap<String, serde_json::Value>,
}

impl VideoInfo {
	/// Parse the output of "yt-dlp --dump-json" for a single media
	pub fn from_json(input: &str) -> Result<Self, crate::Error> {
		return Ok(serde_json::from_str(input.trim())?);
	}

	/// Get the largest size any format reports, in bytes
	/// `filesize` is preferred, `filesize_approx` is used for formats without a exact size
	pub fn estimated_size(&self) -> Option<u64> {
		return self
			.formats
			.iter()
			.filter_map(FormatEntry::size)
			.filter(|v| return v.is_finite() && *v > 0.0)
			.max_by(f64::total_cmp)
			.map(|v| return v as u64);
	}

	/// Get whether the media has any subtitles available
	pub fn has_subtitles(&self) -> bool {
		return !self.subtitles.is_empty();
	}
}
