//! Module for listing all media of a channel and selecting which to download

use std::{
	ffi::OsString,
	path::{
		Path,
		PathBuf,
	},
};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
	data::channel::{
		ChannelInfo,
		Platform,
		VideoMetadata,
	},
	main::cookies::{
		Browser,
		CookieSource,
		CookieStore,
		cookie_args,
	},
	spawn::{
		ArgsHelper,
		CHANNEL_TIMEOUT,
		wait_with_timeout,
		ytdl::base_ytdl,
	},
	utils::sanitize_dir_name,
};

/// Detect the platform of a channel url
pub fn detect_platform(url: &str) -> Option<Platform> {
	return Platform::detect(url);
}

/// A single thumbnail of a listing entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ListingThumbnail {
	url: String,
}

/// A single line of "yt-dlp --dump-json --flat-playlist", either the channel itself or a entry
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
struct ListingLine {
	#[serde(rename = "_type")]
	kind:                   Option<String>,
	id:                     Option<String>,
	title:                  Option<String>,
	url:                    Option<String>,
	webpage_url:            Option<String>,
	duration:               Option<f64>,
	upload_date:            Option<String>,
	view_count:             Option<u64>,
	like_count:             Option<u64>,
	comment_count:          Option<u64>,
	repost_count:           Option<u64>,
	coin_count:             Option<u64>,
	favorite_count:         Option<u64>,
	thumbnail:              Option<String>,
	thumbnails:             Vec<ListingThumbnail>,
	uploader:               Option<String>,
	channel:                Option<String>,
	channel_url:            Option<String>,
	channel_follower_count: Option<u64>,
	playlist_title:         Option<String>,
	playlist_uploader:      Option<String>,
}

impl ListingLine {
	/// Get whether this line describes the channel (playlist) instead of a entry
	fn is_playlist(&self) -> bool {
		return self.kind.as_deref() == Some("playlist");
	}

	/// Get the best available name of the channel this line belongs to
	fn channel_name(&self) -> Option<&str> {
		let candidates = if self.is_playlist() {
			[&self.title, &self.uploader, &self.channel]
		} else {
			[&self.uploader, &self.channel, &self.playlist_uploader]
		};

		return candidates
			.into_iter()
			.chain([&self.playlist_title])
			.filter_map(|v| return v.as_deref())
			.map(str::trim)
			.find(|v| return !v.is_empty());
	}

	/// Convert a entry line into [VideoMetadata]
	/// Returns [`None`] if the entry has no id or no url
	fn into_metadata(self) -> Option<VideoMetadata> {
		let id = self.id.filter(|v| return !v.is_empty())?;
		let url = self.webpage_url.or(self.url).filter(|v| return !v.is_empty())?;
		let thumbnail = self
			.thumbnail
			.or_else(|| return self.thumbnails.into_iter().last().map(|v| return v.url));

		return Some(VideoMetadata {
			title: self.title.unwrap_or_else(|| return id.clone()),
			id,
			url,
			duration: self.duration,
			upload_date: self.upload_date,
			view_count: self.view_count,
			like_count: self.like_count,
			comment_count: self.comment_count,
			repost_count: self.repost_count,
			coin_count: self.coin_count,
			favorite_count: self.favorite_count,
			thumbnail,
		});
	}
}

/// Assemble the arguments to list all entries of a channel
pub fn assemble_channel_command(cookie_args: &[OsString], url: &str) -> Vec<OsString> {
	let mut ytdl_args = ArgsHelper::new();

	ytdl_args.args(cookie_args.iter().cloned());
	ytdl_args.arg("--dump-json").arg("--flat-playlist");
	ytdl_args.arg(url);

	return ytdl_args.into();
}

/// Parse the output of "yt-dlp --dump-json --flat-playlist"
///
/// Every line is a separate json document, lines that are not valid json are ignored
/// Entries keep the order of the listing (newest first for most platforms)
pub fn parse_channel_listing(platform: Platform, url: &str, stdout: &str) -> (ChannelInfo, Vec<VideoMetadata>) {
	let mut channel_name: Option<String> = None;
	let mut channel_url: Option<String> = None;
	let mut follower_count: Option<u64> = None;
	let mut entries = Vec::new();

	for line in stdout.lines().map(str::trim).filter(|v| return !v.is_empty()) {
		let parsed: ListingLine = match serde_json::from_str(line) {
			Ok(v) => v,
			Err(err) => {
				debug!("Ignoring unparseable listing line: {}", err);
				continue;
			},
		};

		if parsed.is_playlist() {
			// the playlist line is the most authoritative source for the channel
			if let Some(name) = parsed.channel_name() {
				channel_name = Some(name.to_owned());
			}
			channel_url = parsed.webpage_url.clone().or(parsed.channel_url.clone()).or(channel_url);
			follower_count = parsed.channel_follower_count.or(follower_count);
			continue;
		}

		if channel_name.is_none() {
			channel_name = parsed.channel_name().map(str::to_owned);
		}
		if channel_url.is_none() {
			channel_url.clone_from(&parsed.channel_url);
		}
		if follower_count.is_none() {
			follower_count = parsed.channel_follower_count;
		}

		match parsed.into_metadata() {
			Some(v) => entries.push(v),
			None => debug!("Ignoring listing entry without id or url"),
		}
	}

	let info = ChannelInfo {
		platform,
		channel_name: channel_name.unwrap_or_else(|| return platform.default_channel_name().to_owned()),
		channel_url: channel_url.unwrap_or_else(|| return url.to_owned()),
		follower_count,
		video_count: entries.len(),
	};

	return (info, entries);
}

/// List all entries of the channel at `url`
pub fn extract_channel(url: &str, cookie_args: &[OsString]) -> Result<(ChannelInfo, Vec<VideoMetadata>), crate::Error> {
	let Some(platform) = detect_platform(url) else {
		return Err(crate::Error::other(format!("Unsupported platform for url \"{url}\"")));
	};

	info!("Listing {} channel \"{}\"", platform, url);

	let output = wait_with_timeout(
		base_ytdl(assemble_channel_command(cookie_args, url)),
		CHANNEL_TIMEOUT,
		"yt-dlp channel listing",
	)?;

	if !output.success {
		return Err(crate::Error::command_unsuccessful(format!(
			"Failed to extract channel info: {}",
			output.stderr.trim()
		)));
	}

	let (info, entries) = parse_channel_listing(platform, url, &output.stdout);

	if entries.is_empty() {
		warn!("Channel listing of \"{}\" did not contain any entries", url);
	}

	return Ok((info, entries));
}

/// Get the cookie arguments to list a channel of `platform`
///
/// Platforms that prefer cookies fall back to the first of `browsers` when nothing explicit or saved is available
/// Returns the arguments and a hint to show to the user when a fallback was used
pub fn channel_cookie_args(
	platform: Platform,
	url: &str,
	source: &CookieSource,
	store: Option<&CookieStore>,
	browsers: &[Browser],
) -> (Vec<OsString>, Option<String>) {
	let args = cookie_args(url, source, store);

	if !args.is_empty() || *source != CookieSource::None || !platform.prefers_cookies() {
		return (args, None);
	}

	let Some(browser) = browsers.first() else {
		return (
			args,
			Some(format!(
				"Hint: {platform} listings usually require login cookies, use --cookies-from-browser <BROWSER> or --cookies <FILE>"
			)),
		);
	};

	return (
		vec!["--cookies-from-browser".into(), browser.as_str().into()],
		Some(format!(
			"Hint: {platform} listings usually require login cookies, using --cookies-from-browser {browser}"
		)),
	);
}

/// Parse a date given as "YYYY-MM-DD" or "YYYYMMDD"
pub fn parse_filter_date(input: &str) -> Result<NaiveDate, crate::Error> {
	let input = input.trim();

	return NaiveDate::parse_from_str(input, "%Y-%m-%d")
		.or_else(|_| return NaiveDate::parse_from_str(input, "%Y%m%d"))
		.map_err(|_| return crate::Error::other(format!("Invalid date \"{input}\", expected YYYY-MM-DD")));
}

/// Selection of channel entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelFilter {
	/// Keep only the first (latest) N entries after all other filters
	pub count:       Option<usize>,
	/// Only entries uploaded on or after this date
	pub date_after:  Option<NaiveDate>,
	/// Only entries uploaded on or before this date
	pub date_before: Option<NaiveDate>,
	/// Only entries with at least this many views
	pub min_views:   Option<u64>,
}

impl ChannelFilter {
	/// Create a filter that only keeps the latest `count` entries
	pub fn latest(count: usize) -> Self {
		return Self {
			count: Some(count),
			..Default::default()
		};
	}

	/// Get whether this filter keeps everything
	pub fn is_empty(&self) -> bool {
		return self == &Self::default();
	}

	/// Check a single entry against the date and view filters
	/// Entries missing a field that is filtered on do not match
	pub fn matches(&self, entry: &VideoMetadata) -> bool {
		if self.date_after.is_some() || self.date_before.is_some() {
			let Some(date) = entry.upload_naivedate() else {
				return false;
			};

			if self.date_after.is_some_and(|after| return date < after) {
				return false;
			}
			if self.date_before.is_some_and(|before| return date > before) {
				return false;
			}
		}

		if let Some(min_views) = self.min_views {
			if entry.view_count.is_none_or(|views| return views < min_views) {
				return false;
			}
		}

		return true;
	}

	/// Apply the filter to `entries`, keeping their order
	pub fn apply(&self, entries: Vec<VideoMetadata>) -> Vec<VideoMetadata> {
		let filtered = entries.into_iter().filter(|v| return self.matches(v));

		return match self.count {
			Some(count) => filtered.take(count).collect(),
			None => filtered.collect(),
		};
	}
}

/// Get the output directory of a channel download: `<base>/<platform>/<sanitized name>_<YYYY-MM-DD>`
pub fn channel_output_dir(base: &Path, platform: Platform, channel_name: &str, date: NaiveDate) -> PathBuf {
	return base
		.join(platform.as_str())
		.join(format!("{}_{}", sanitize_dir_name(channel_name), date.format("%Y-%m-%d")));
}

#[cfg(test)]
mod test {
	use super::*;

	fn entry(id: &str, date: Option<&str>, views: Option<u64>) -> VideoMetadata {
		return VideoMetadata {
			id: id.to_owned(),
			title: format!("title {id}"),
			url: format!("https://youtu.be/{id}"),
			upload_date: date.map(str::to_owned),
			view_count: views,
			..Default::default()
		};
	}

	#[test]
	fn test_assemble_channel_command() {
		let cookies = vec![OsString::from("--cookies-from-browser"), OsString::from("chrome")];

		assert_eq!(
			vec![
				OsString::from("--cookies-from-browser"),
				OsString::from("chrome"),
				OsString::from("--dump-json"),
				OsString::from("--flat-playlist"),
				OsString::from("https://www.youtube.com/@someone")
			],
			assemble_channel_command(&cookies, "https://www.youtube.com/@someone")
		);
	}

	#[test]
	fn test_parse_listing_with_playlist_line() {
		let stdout = r#"
{"_type": "url", "id": "a1", "title": "First", "url": "https://www.youtube.com/watch?v=a1", "duration": 61.0, "view_count": 1200, "thumbnails": [{"url": "https://i.ytimg.com/small.jpg"}, {"url": "https://i.ytimg.com/big.jpg"}]}
not json at all
{"_type": "url", "id": "b2", "title": "Second", "webpage_url": "https://www.youtube.com/watch?v=b2"}
{"_type": "url", "title": "No id", "url": "https://www.youtube.com/watch?v=zz"}
{"_type": "playlist", "id": "UC1", "title": "Someone - Videos", "webpage_url": "https://www.youtube.com/@someone/videos", "channel_follower_count": 5000}
"#;

		let (info, entries) = parse_channel_listing(Platform::Youtube, "https://www.youtube.com/@someone", stdout);

		assert_eq!(
			ChannelInfo {
				platform:       Platform::Youtube,
				channel_name:   "Someone - Videos".to_owned(),
				channel_url:    "https://www.youtube.com/@someone/videos".to_owned(),
				follower_count: Some(5000),
				video_count:    2,
			},
			info
		);
		assert_eq!(2, entries.len());
		assert_eq!("a1", entries[0].id);
		assert_eq!(Some(1200), entries[0].view_count);
		assert_eq!(Some("https://i.ytimg.com/big.jpg".to_owned()), entries[0].thumbnail);
		assert_eq!("https://www.youtube.com/watch?v=b2", entries[1].url);
	}

	#[test]
	fn test_parse_listing_entries_only() {
		let stdout = r#"{"id": "BV1", "title": "视频", "url": "https://www.bilibili.com/video/BV1", "uploader": "某UP主", "channel_url": "https://space.bilibili.com/1", "channel_follower_count": 42, "coin_count": 7}
{"id": "BV2", "url": "https://www.bilibili.com/video/BV2", "uploader": "Other"}"#;

		let (info, entries) = parse_channel_listing(Platform::Bilibili, "https://space.bilibili.com/1/video", stdout);

		assert_eq!("某UP主", info.channel_name);
		assert_eq!("https://space.bilibili.com/1", info.channel_url);
		assert_eq!(Some(42), info.follower_count);
		assert_eq!(2, info.video_count);
		assert_eq!(Some(7), entries[0].coin_count);
		// title falls back to the id
		assert_eq!("BV2", entries[1].title);
	}

	#[test]
	fn test_listed_channel_found_by_typed_url() {
		use crate::data::job_state::{
			ChannelJob,
			Job,
			StateFile,
		};

		let typed = "https://space.bilibili.com/1/video";
		let stdout = r#"{"id": "BV1", "title": "视频", "url": "https://www.bilibili.com/video/BV1", "uploader": "某UP主", "channel_url": "https://space.bilibili.com/1"}"#;
		let (info, entries) = parse_channel_listing(Platform::Bilibili, typed, stdout);
		assert_eq!("https://space.bilibili.com/1", info.channel_url);

		let jobs = entries.into_iter().map(Job::from_metadata).collect();
		let mut state = StateFile::default();
		let idx = state.upsert_channel(ChannelJob::new(typed, info.clone(), PathBuf::from("/out/a"), jobs));

		assert_eq!(Some(idx), state.find_channel(typed));

		// listing the same channel again replaces the earlier job list
		let again = state.upsert_channel(ChannelJob::new(typed, info, PathBuf::from("/out/b"), Vec::new()));
		assert_eq!(idx, again);
		assert_eq!(1, state.channels.len());
		assert_eq!(PathBuf::from("/out/b"), state.channels[idx].output_dir);
	}

	#[test]
	fn test_parse_listing_defaults() {
		let (info, entries) = parse_channel_listing(Platform::Xhs, "https://www.xiaohongshu.com/user/profile/1", "");

		assert_eq!("小红书用户", info.channel_name);
		assert_eq!("https://www.xiaohongshu.com/user/profile/1", info.channel_url);
		assert_eq!(None, info.follower_count);
		assert_eq!(0, info.video_count);
		assert!(entries.is_empty());
	}

	#[test]
	fn test_parse_filter_date() {
		let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

		assert_eq!(expected, parse_filter_date("2024-03-05").unwrap());
		assert_eq!(expected, parse_filter_date("20240305").unwrap());
		assert_eq!(expected, parse_filter_date(" 2024-03-05 ").unwrap());
		assert!(parse_filter_date("05.03.2024").is_err());
		assert!(parse_filter_date("2024-13-01").is_err());
	}

	#[test]
	fn test_filter_dates() {
		let filter = ChannelFilter {
			date_after: Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
			date_before: Some(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()),
			..Default::default()
		};

		let entries = vec![
			entry("old", Some("20231231"), Some(10)),
			entry("first", Some("20240101"), Some(10)),
			entry("mid", Some("20240315"), None),
			entry("last", Some("20240630"), Some(10)),
			entry("new", Some("20240701"), Some(10)),
			entry("nodate", None, Some(10)),
			entry("baddate", Some("sometime"), Some(10)),
		];

		let ids: Vec<String> = filter.apply(entries).into_iter().map(|v| return v.id).collect();
		assert_eq!(vec!["first", "mid", "last"], ids);
	}

	#[test]
	fn test_filter_views_and_count() {
		let filter = ChannelFilter {
			count: Some(2),
			min_views: Some(100),
			..Default::default()
		};

		let entries = vec![
			entry("a", None, Some(50)),
			entry("b", None, Some(100)),
			entry("c", None, None),
			entry("d", None, Some(1000)),
			entry("e", None, Some(5000)),
		];

		let ids: Vec<String> = filter.apply(entries).into_iter().map(|v| return v.id).collect();
		assert_eq!(vec!["b", "d"], ids);
	}

	#[test]
	fn test_filter_latest_and_empty() {
		assert!(ChannelFilter::default().is_empty());
		assert!(!ChannelFilter::latest(10).is_empty());

		let entries: Vec<VideoMetadata> = (0..20).map(|i| return entry(&i.to_string(), None, None)).collect();

		assert_eq!(10, ChannelFilter::latest(10).apply(entries.clone()).len());
		assert_eq!(20, ChannelFilter::default().apply(entries).len());
	}

	#[test]
	fn test_channel_output_dir() {
		assert_eq!(
			PathBuf::from("/out/bilibili/Some_Name_2024-02-03"),
			channel_output_dir(
				Path::new("/out"),
				Platform::Bilibili,
				"Some/Name",
				NaiveDate::from_ymd_opt(2024, 2, 3).unwrap()
			)
		);
	}

	#[test]
	fn test_channel_cookie_args() {
		let url = "https://space.bilibili.com/1";

		// fallback to the first available browser
		let (args, hint) = channel_cookie_args(
			Platform::Bilibili,
			url,
			&CookieSource::None,
			None,
			&[Browser::Firefox, Browser::Chrome],
		);
		assert_eq!(vec![OsString::from("--cookies-from-browser"), OsString::from("firefox")], args);
		assert!(hint.is_some());

		// no browser available
		let (args, hint) = channel_cookie_args(Platform::Bilibili, url, &CookieSource::None, None, &[]);
		assert!(args.is_empty());
		assert!(hint.is_some());

		// explicit source always wins
		let (args, hint) = channel_cookie_args(
			Platform::Bilibili,
			url,
			&CookieSource::Browser(Browser::Edge),
			None,
			&[Browser::Firefox],
		);
		assert_eq!(vec![OsString::from("--cookies-from-browser"), OsString::from("edge")], args);
		assert_eq!(None, hint);

		// disabled stays disabled
		let (args, hint) = channel_cookie_args(Platform::Bilibili, url, &CookieSource::Disabled, None, &[Browser::Firefox]);
		assert!(args.is_empty());
		assert_eq!(None, hint);

		// platforms that dont need cookies
		let (args, hint) = channel_cookie_args(
			Platform::Youtube,
			"https://www.youtube.com/@someone",
			&CookieSource::None,
			None,
			&[Browser::Firefox],
		);
		assert!(args.is_empty());
		assert_eq!(None, hint);
	}
}
