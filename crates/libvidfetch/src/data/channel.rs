//! Module for channel and channel-entry data

use serde::{
	Deserialize,
	Serialize,
};
use url::Url;

/// Platforms a channel can be listed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
	Youtube,
	Bilibili,
	Xhs,
	Tiktok,
	Vimeo,
}

impl Platform {
	/// Detect the platform from the host of `url`
	/// Returns [`None`] for unparseable urls and unknown hosts
	pub fn detect(url: &str) -> Option<Self> {
		let parsed = Url::parse(url.trim()).ok()?;
		let host = parsed.host_str()?.to_lowercase();

		let matches = |domain: &str| return host == domain || host.ends_with(&format!(".{domain}"));

		if matches("youtube.com") || matches("youtu.be") {
			return Some(Self::Youtube);
		}
		if matches("bilibili.com") || matches("b23.tv") {
			return Some(Self::Bilibili);
		}
		if matches("xiaohongshu.com") || matches("xhslink.com") {
			return Some(Self::Xhs);
		}
		if matches("tiktok.com") {
			return Some(Self::Tiktok);
		}
		if matches("vimeo.com") {
			return Some(Self::Vimeo);
		}

		return None;
	}

	/// Short name used for directories and the state file
	pub fn as_str(&self) -> &'static str {
		return match self {
			Self::Youtube => "youtube",
			Self::Bilibili => "bilibili",
			Self::Xhs => "xhs",
			Self::Tiktok => "tiktok",
			Self::Vimeo => "vimeo",
		};
	}

	/// Channel name used when the listing did not contain any name
	pub fn default_channel_name(&self) -> &'static str {
		return match self {
			Self::Youtube => "YouTube Channel",
			Self::Bilibili => "Bilibili UP主",
			Self::Xhs => "小红书用户",
			Self::Tiktok => "TikTok User",
			Self::Vimeo => "Vimeo User",
		};
	}

	/// Get whether listing this platform generally requires login cookies
	pub fn prefers_cookies(&self) -> bool {
		return matches!(self, Self::Bilibili | Self::Xhs);
	}
}

impl std::fmt::Display for Platform {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		return f.write_str(self.as_str());
	}
}

/// Information about a channel (uploader)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
	pub platform:       Platform,
	pub channel_name:   String,
	pub channel_url:    String,
	#[serde(default)]
	pub follower_count: Option<u64>,
	#[serde(default)]
	pub video_count:    usize,
}

/// Metadata of a single channel entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VideoMetadata {
	pub id:             String,
	pub title:          String,
	pub url:            String,
	/// Duration in seconds
	#[serde(default)]
	pub duration:       Option<f64>,
	/// Upload date as reported by yt-dlp ("YYYYMMDD")
	#[serde(default)]
	pub upload_date:    Option<String>,
	#[serde(default)]
	pub view_count:     Option<u64>,
	#[serde(default)]
	pub like_count:     Option<u64>,
	#[serde(default)]
	pub comment_count:  Option<u64>,
	#[serde(default)]
	pub repost_count:   Option<u64>,
	#[serde(default)]
	pub coin_count:     Option<u64>,
	#[serde(default)]
	pub favorite_count: Option<u64>,
	#[serde(default)]
	pub thumbnail:      Option<String>,
}

impl VideoMetadata {
	/// Parse [`VideoMetadata::upload_date`] as a date
	pub fn upload_naivedate(&self) -> Option<chrono::NaiveDate> {
		return self
			.upload_date
			.as_deref()
			.and_then(|v| return chrono::NaiveDate::parse_from_str(v, "%Y%m%d").ok());
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_detect_platform() {
		assert_eq!(
			Some(Platform::Youtube),
			Platform::detect("https://www.youtube.com/@someone/videos")
		);
		assert_eq!(Some(Platform::Youtube), Platform::detect("https://youtu.be/abc"));
		assert_eq!(
			Some(Platform::Bilibili),
			Platform::detect("https://space.bilibili.com/12345")
		);
		assert_eq!(
			Some(Platform::Xhs),
			Platform::detect("https://www.xiaohongshu.com/user/profile/abc")
		);
		assert_eq!(Some(Platform::Tiktok), Platform::detect("https://www.tiktok.com/@user"));
		assert_eq!(Some(Platform::Vimeo), Platform::detect("https://vimeo.com/user1"));

		assert_eq!(None, Platform::detect("https://example.com/youtube.com"));
		assert_eq!(None, Platform::detect("https://notyoutube.com/"));
		assert_eq!(None, Platform::detect("not a url"));
	}

	#[test]
	fn test_platform_serde() {
		assert_eq!("\"xhs\"", serde_json::to_string(&Platform::Xhs).unwrap());
		assert_eq!(
			Platform::Bilibili,
			serde_json::from_str::<Platform>("\"bilibili\"").unwrap()
		);
		assert_eq!("youtube", Platform::Youtube.to_string());
	}

	#[test]
	fn test_upload_naivedate() {
		let mut meta = VideoMetadata {
			upload_date: Some("20240131".to_owned()),
			..Default::default()
		};
		assert_eq!(chrono::NaiveDate::from_ymd_opt(2024, 1, 31), meta.upload_naivedate());

		meta.upload_date = Some("garbage".to_owned());
		assert_eq!(None, meta.upload_naivedate());

		meta.upload_date = None;
		assert_eq!(None, meta.upload_naivedate());
	}
}
