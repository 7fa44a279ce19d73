//! Module for cookie bookkeeping
//!
//! Cookies are never read by vidfetch itself, they are only passed on to yt-dlp either as a Netscape cookie file or as a browser to extract from

use std::{
	ffi::OsString,
	path::{
		Path,
		PathBuf,
	},
	str::FromStr,
};

use url::Url;

use crate::error::IOErrorToError;

/// A site that is known to require login cookies for most media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSite {
	/// Base domain, also used as the cookie file name
	pub domain: &'static str,
	/// Human readable name
	pub name:   &'static str,
}

/// All sites known to require login cookies
pub const COOKIE_SITES: &[CookieSite] = &[
	CookieSite {
		domain: "douyin.com",
		name:   "抖音",
	},
	CookieSite {
		domain: "tiktok.com",
		name:   "TikTok",
	},
	CookieSite {
		domain: "bilibili.com",
		name:   "B站",
	},
	CookieSite {
		domain: "weibo.com",
		name:   "微博",
	},
	CookieSite {
		domain: "ixigua.com",
		name:   "西瓜视频",
	},
];

/// Lower-cased phrases in yt-dlp errors that indicate missing or expired cookies
const COOKIE_ERROR_INDICATORS: &[&str] = &[
	"cookies are needed",
	"fresh cookies",
	"login required",
	"authentication",
	"sign in",
	"not logged in",
];

/// First line of a Netscape cookie file
const NETSCAPE_HEADERS: &[&str] = &["# Netscape HTTP Cookie File", "# HTTP Cookie File"];

/// Browsers yt-dlp can extract cookies from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
	Chrome,
	Firefox,
	Safari,
	Edge,
	Chromium,
	Brave,
}

impl Browser {
	/// All variants, in order of preference
	pub const ALL: [Self; 6] = [
		Self::Chrome,
		Self::Firefox,
		Self::Safari,
		Self::Edge,
		Self::Chromium,
		Self::Brave,
	];

	/// Name as yt-dlp expects it for "--cookies-from-browser"
	pub fn as_str(&self) -> &'static str {
		return match self {
			Self::Chrome => "chrome",
			Self::Firefox => "firefox",
			Self::Safari => "safari",
			Self::Edge => "edge",
			Self::Chromium => "chromium",
			Self::Brave => "brave",
		};
	}
}

impl FromStr for Browser {
	type Err = crate::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lower = s.trim().to_lowercase();

		return Self::ALL
			.into_iter()
			.find(|v| return v.as_str() == lower)
			.ok_or_else(|| {
				return crate::Error::other(format!(
					"Unknown browser \"{s}\", expected one of chrome, firefox, safari, edge, chromium, brave"
				));
			});
	}
}

impl std::fmt::Display for Browser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		return f.write_str(self.as_str());
	}
}

/// Where cookies for yt-dlp should come from
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CookieSource {
	/// Nothing explicit, saved cookie files may still be used
	#[default]
	None,
	/// A explicit Netscape cookie file
	File(PathBuf),
	/// Extract from a browser profile
	Browser(Browser),
	/// Never pass any cookies
	Disabled,
}

impl CookieSource {
	/// Get whether the user explicitly gave cookies
	pub fn is_explicit(&self) -> bool {
		return matches!(self, Self::File(_) | Self::Browser(_));
	}
}

/// Get the host of `url`, lower-cased and without a leading "www."
fn normalized_host(url: &str) -> Option<String> {
	let parsed = Url::parse(url.trim()).ok()?;
	let host = parsed.host_str()?.to_lowercase();

	return Some(host.strip_prefix("www.").map(str::to_owned).unwrap_or(host));
}

/// Check if `host` is `domain` or a subdomain of it
fn host_matches(host: &str, domain: &str) -> bool {
	return host == domain || host.ends_with(&format!(".{domain}"));
}

/// Get the known cookie site `url` belongs to
pub fn site_for_url(url: &str) -> Option<&'static CookieSite> {
	let host = normalized_host(url)?;

	return COOKIE_SITES.iter().find(|site| return host_matches(&host, site.domain));
}

/// Check if `url` is from Douyin, which yt-dlp cannot download reliably
/// Only "douyin.com" and its subdomains match, "tiktok.com" urls are left to yt-dlp which supports them
pub fn is_douyin_url(url: &str) -> bool {
	return normalized_host(url).is_some_and(|host| return host_matches(&host, "douyin.com"));
}

/// Check if a yt-dlp error message indicates that (fresh) cookies are needed
pub fn needs_cookie_error(msg: &str) -> bool {
	let lower = msg.to_lowercase();

	return COOKIE_ERROR_INDICATORS.iter().any(|v| return lower.contains(v));
}

/// Directory of per-domain Netscape cookie files ("<domain>.txt")
#[derive(Debug, Clone, PartialEq)]
pub struct CookieStore {
	dir: PathBuf,
}

impl CookieStore {
	/// Create a store in `dir`, the directory is only created when importing
	pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
		return Self { dir: dir.into() };
	}

	/// Get the default store directory ("<config dir>/vidfetch/cookies")
	pub fn default_dir() -> Option<PathBuf> {
		return dirs::config_dir().map(|v| return v.join("vidfetch").join("cookies"));
	}

	/// Get the directory of this store
	pub fn dir(&self) -> &Path {
		return &self.dir;
	}

	/// Get the cookie file path for `domain`
	pub fn path_for(&self, domain: &str) -> PathBuf {
		return self.dir.join(format!("{}.txt", normalize_domain(domain)));
	}

	/// Check if a cookie file exists for `domain`
	pub fn has(&self, domain: &str) -> bool {
		return self.path_for(domain).is_file();
	}

	/// Validate and copy `file` as the cookie file for `domain`
	/// Returns the path of the stored file
	pub fn import<P: AsRef<Path>>(&self, file: P, domain: &str) -> Result<PathBuf, crate::Error> {
		let file = file.as_ref();
		let domain = normalize_domain(domain);

		if domain.is_empty() {
			return Err(crate::Error::other("Cookie domain may not be empty"));
		}

		if !file.is_file() {
			return Err(crate::Error::not_a_file("Cookie file does not exist", file));
		}

		let content = std::fs::read_to_string(file).attach_path_err(file)?;
		validate_netscape(&content).map_err(|msg| return crate::Error::not_a_file(msg, file))?;

		std::fs::create_dir_all(&self.dir).attach_path_err(&self.dir)?;

		let target = self.path_for(&domain);
		std::fs::write(&target, content).attach_path_err(&target)?;
		info!("Imported cookies for \"{}\" to \"{}\"", domain, target.display());

		return Ok(target);
	}

	/// List all stored cookie files as (domain, path), sorted by domain
	pub fn list(&self) -> Result<Vec<(String, PathBuf)>, crate::Error> {
		if !self.dir.exists() {
			return Ok(Vec::new());
		}

		let mut out = Vec::new();

		for entry in std::fs::read_dir(&self.dir).attach_path_err(&self.dir)? {
			let path = entry.attach_path_err(&self.dir)?.path();

			if !path.is_file() || path.extension().is_none_or(|v| return v != "txt") {
				continue;
			}

			if let Some(stem) = path.file_stem() {
				out.push((stem.to_string_lossy().to_string(), path));
			}
		}

		out.sort();

		return Ok(out);
	}

	/// Remove the stored cookie file for `domain`
	/// Returns `false` if there was no file to remove
	pub fn remove(&self, domain: &str) -> Result<bool, crate::Error> {
		let path = self.path_for(domain);

		if !path.exists() {
			return Ok(false);
		}

		std::fs::remove_file(&path).attach_path_err(&path)?;

		return Ok(true);
	}
}

/// Normalize a domain for use as a file name
fn normalize_domain(domain: &str) -> String {
	let lower = domain.trim().to_lowercase();
	let stripped = lower.strip_prefix("www.").unwrap_or(&lower);

	return stripped
		.chars()
		.filter(|c| return c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
		.collect();
}

/// Check that `content` looks like a Netscape cookie file
/// Either the header is present or at least one line has the 7 tab-separated fields
fn validate_netscape(content: &str) -> Result<(), String> {
	let first = content.lines().map(str::trim).find(|v| return !v.is_empty());

	if first.is_some_and(|first| return NETSCAPE_HEADERS.iter().any(|h| return first.starts_with(h))) {
		return Ok(());
	}

	let has_cookie_line = content
		.lines()
		.filter(|v| return !v.starts_with('#') || v.starts_with("#HttpOnly_"))
		.any(|v| return v.split('\t').count() == 7);

	if has_cookie_line {
		return Ok(());
	}

	return Err("File is not a Netscape format cookie file".to_owned());
}

/// Get the profile directories that indicate a installed browser on this system
#[cfg(target_os = "macos")]
fn browser_profile_dirs() -> Vec<(Browser, PathBuf)> {
	let Some(home) = dirs::home_dir() else {
		return Vec::new();
	};
	let support = home.join("Library/Application Support");

	return vec![
		(Browser::Chrome, support.join("Google/Chrome/Default")),
		(Browser::Chromium, support.join("Chromium/Default")),
		(Browser::Firefox, support.join("Firefox/Profiles")),
		(Browser::Safari, home.join("Library/Safari")),
		(Browser::Edge, support.join("Microsoft Edge/Default")),
		(Browser::Brave, support.join("BraveSoftware/Brave-Browser/Default")),
	];
}

/// Get the profile directories that indicate a installed browser on this system
#[cfg(target_os = "windows")]
fn browser_profile_dirs() -> Vec<(Browser, PathBuf)> {
	let mut out = Vec::new();

	if let Some(local) = dirs::data_local_dir() {
		out.push((Browser::Chrome, local.join(r"Google\Chrome\User Data\Default")));
		out.push((Browser::Edge, local.join(r"Microsoft\Edge\User Data\Default")));
		out.push((Browser::Brave, local.join(r"BraveSoftware\Brave-Browser\User Data\Default")));
	}
	if let Some(roaming) = dirs::data_dir() {
		out.push((Browser::Firefox, roaming.join(r"Mozilla\Firefox\Profiles")));
	}

	return out;
}

/// Get the profile directories that indicate a installed browser on this system
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn browser_profile_dirs() -> Vec<(Browser, PathBuf)> {
	let Some(home) = dirs::home_dir() else {
		return Vec::new();
	};
	let config = home.join(".config");

	return vec![
		(Browser::Chrome, config.join("google-chrome/Default")),
		(Browser::Chromium, config.join("chromium/Default")),
		(Browser::Firefox, home.join(".mozilla/firefox")),
		(Browser::Edge, config.join("microsoft-edge/Default")),
		(Browser::Brave, config.join("BraveSoftware/Brave-Browser/Default")),
	];
}

/// Get all browsers that have a profile directory on this system
pub fn available_browsers() -> Vec<Browser> {
	return browser_profile_dirs()
		.into_iter()
		.filter(|(_, path)| return path.exists())
		.map(|(browser, _)| return browser)
		.collect();
}

/// Get the yt-dlp cookie arguments for `url`
///
/// Precedence: explicit file, then browser, then the saved cookie file of the url's site, then nothing
pub fn cookie_args(url: &str, source: &CookieSource, store: Option<&CookieStore>) -> Vec<OsString> {
	match source {
		CookieSource::Disabled => return Vec::new(),
		CookieSource::File(path) => return vec!["--cookies".into(), path.into()],
		CookieSource::Browser(browser) => return vec!["--cookies-from-browser".into(), browser.as_str().into()],
		CookieSource::None => (),
	}

	if let (Some(site), Some(store)) = (site_for_url(url), store) {
		if store.has(site.domain) {
			debug!("Using saved cookies for \"{}\"", site.domain);
			return vec!["--cookies".into(), store.path_for(site.domain).into()];
		}
	}

	return Vec::new();
}

/// Get a human readable hint on how to provide cookies for `url`
pub fn cookie_hint(url: &str) -> String {
	let site_name = site_for_url(url).map_or("This site", |v| return v.name);
	let browsers = available_browsers();

	let mut hint = format!("{site_name} requires login cookies.");

	if browsers.is_empty() {
		hint.push_str(" Export a Netscape cookie file (for example with a \"Get cookies.txt\" browser extension) and use --cookies <FILE> or \"vidfetch cookies import\".");
	} else {
		let list = browsers.iter().map(Browser::as_str).collect::<Vec<_>>().join(", ");
		hint.push_str(&format!(
			" Use --cookies-from-browser <BROWSER> (available: {list}) or --cookies <FILE>."
		));
	}

	return hint;
}
