//! Module for utility functions, that may be used in various other modules

use std::path::{
	Component,
	Path,
	PathBuf,
};

use path_absolutize::Absolutize;

use crate::error::IOErrorToError;

/// Natural-language aliases for common directories, matched case-insensitive against whole path components
/// Order does not matter, because only whole components are compared
const PATH_ALIASES: &[(&str, &str)] = &[
	("下载", "~/Downloads"),
	("桌面", "~/Desktop"),
	("documents", "~/Documents"),
	("文档", "~/Documents"),
	("视频", "~/Movies"),
	("music", "~/Music"),
	("音乐", "~/Music"),
	("pictures", "~/Pictures"),
	("图片", "~/Pictures"),
	("home", "~"),
	("主目录", "~"),
	("current", "."),
	("当前目录", "."),
];

/// Maximal amount of characters a sanitized filename may have
const MAX_FILENAME_CHARS: usize = 200;
/// Maximal amount of characters a sanitized directory name may have
const MAX_DIRNAME_CHARS: usize = 100;
/// Characters that are not allowed in file or directory names on at least one platform
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Simple helper to resolve "~" to the Home directory
/// System agnostic as long as [`dirs::home_dir`] support's it
pub fn expand_tidle<I: AsRef<Path>>(input: I) -> Option<PathBuf> {
	let path = input.as_ref();

	// "~user" syntax is not supported and returned as-is
	let Ok(rest) = path.strip_prefix("~") else {
		return Some(path.to_owned());
	};

	return dirs::home_dir().map(|mut v| {
		if !rest.as_os_str().is_empty() {
			v.push(rest);
		}
		return v;
	});
}

/// Convert input path to a absolute path, without hitting the filesystem.
/// This function handles `~`(home)
///
/// If the start is not absolute, CWD will be used.
///
/// This functions behavior:
/// - `/path/to/inner/../somewhere` -> `/path/to/somewhere`
/// - `relative/to/somewhere` -> `CWD/relative/to/somewhere`
/// - `~/somewhere/in/home` -> `HOME/somewhere/in/home`
pub fn to_absolute<P: AsRef<Path>>(input: P) -> std::io::Result<PathBuf> {
	let Some(converted) = expand_tidle(input) else {
		return Err(std::io::Error::new(
			std::io::ErrorKind::InvalidInput,
			"Could not resolve \"~\"",
		));
	};

	return converted.absolutize().map(|v| return v.to_path_buf());
}

/// Look up a single path component in the alias table
fn lookup_alias(component: &str) -> Option<&'static str> {
	let lower = component.to_lowercase();

	return PATH_ALIASES
		.iter()
		.find(|(alias, _)| return *alias == lower)
		.map(|(_, target)| return *target);
}

/// Replace natural-language aliases (like "下载" or "documents") with their real directories
/// Only whole path components are replaced, so `/data/homework` stays as-is
///
/// Does not expand `~` or make the path absolute, see [`to_absolute`] for that
pub fn resolve_path_alias<P: AsRef<Path>>(input: P) -> PathBuf {
	let input = input.as_ref();
	let mut out = PathBuf::new();

	for component in input.components() {
		match component {
			Component::Normal(name) => {
				let alias = name.to_str().and_then(lookup_alias);

				match alias {
					Some(target) => out.push(target),
					None => out.push(name),
				}
			},
			other => out.push(other.as_os_str()),
		}
	}

	return out;
}

/// Resolve aliases, `~` and relative parts of `input` and create the directory (including parents)
pub fn ensure_dir<P: AsRef<Path>>(input: P) -> Result<PathBuf, crate::Error> {
	let resolved = to_absolute(resolve_path_alias(input.as_ref())).attach_path_err(input.as_ref())?;

	if resolved.exists() && !resolved.is_dir() {
		return Err(crate::Error::not_a_directory(
			"Output path exists, but is not a directory",
			resolved,
		));
	}

	std::fs::create_dir_all(&resolved).attach_path_err(&resolved)?;

	return Ok(resolved);
}

/// Limit `input` to `max` characters, cutting on char boundaries
fn limit_chars(input: &str, max: usize) -> String {
	return input.chars().take(max).collect();
}

/// Remove characters that are not allowed in filenames and limit the length
pub fn sanitize_filename(name: &str) -> String {
	let cleaned: String = name.chars().filter(|c| return !FORBIDDEN_CHARS.contains(c)).collect();

	return limit_chars(cleaned.trim(), MAX_FILENAME_CHARS).trim().to_owned();
}

/// Replace characters that are not allowed in directory names with `_` and limit the length
/// An empty result is returned as `unnamed`
pub fn sanitize_dir_name(name: &str) -> String {
	let cleaned: String = name
		.chars()
		.map(|c| {
			if FORBIDDEN_CHARS.contains(&c) {
				return '_';
			}
			return c;
		})
		.collect();

	let limited = limit_chars(cleaned.trim(), MAX_DIRNAME_CHARS).trim().to_owned();

	if limited.is_empty() {
		return "unnamed".to_owned();
	}

	return limited;
}

/// Maximal amount of numbered candidates [`unique_path`] will try
const MAX_UNIQUE_TRIES: usize = 1000;

/// Get a path that does not exist yet, based on `path`
/// If `path` already exists, ` (1)`, ` (2)`... is added before the extension
///
/// Returns [`None`] if no free path was found in a reasonable amount of tries
pub fn unique_path<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
	let path = path.as_ref();

	if !path.exists() {
		return Some(path.to_owned());
	}

	let stem = path.file_stem().map(|v| return v.to_string_lossy().to_string()).unwrap_or_default();
	let ext = path.extension().map(|v| return v.to_string_lossy().to_string());
	let parent = path.parent().unwrap_or(Path::new(""));

	for i in 1..=MAX_UNIQUE_TRIES {
		let name = match &ext {
			Some(ext) => format!("{stem} ({i}).{ext}"),
			None => format!("{stem} ({i})"),
		};
		let candidate = parent.join(name);

		if !candidate.exists() {
			return Some(candidate);
		}
	}

	return None;
}

/// Format a number with `,` as thousands separator
pub fn thousands(num: u64) -> String {
	let digits = num.to_string();
	let mut out = String::with_capacity(digits.len() + digits.len() / 3);

	for (i, c) in digits.chars().enumerate() {
		if i != 0 && (digits.len() - i) % 3 == 0 {
			out.push(',');
		}
		out.push(c);
	}

	return out;
}

#[cfg(test)]
mod test {
	use super::*;

	mod expand_tidle {
		use super::*;

		#[test]
		fn basic_func() {
			// fake home
			unsafe { std::env::set_var("HOME", "/custom/home") };

			// should not modify a absolute path
			let absolue_path = PathBuf::from("/absolute/to/path");
			assert_eq!(
				absolue_path,
				expand_tidle(&absolue_path).expect("Expected to return a SOME value")
			);

			// should not modify a relative path
			let relative_path = PathBuf::from("./inner/path");
			assert_eq!(
				relative_path,
				expand_tidle(&relative_path).expect("Expected to return a SOME value")
			);

			// should resolve "~" without extra paths
			assert_eq!(
				dirs::home_dir().expect("Expected to return a SOME value"),
				expand_tidle("~").expect("Expected to return a SOME value")
			);

			// should resolve "~" with extra paths
			assert_eq!(
				Path::join(&dirs::home_dir().expect("Expected to return a SOME value"), "some/path"),
				expand_tidle("~/some/path").expect("Expected to return a SOME value")
			);

			// should return weird path "~user"
			let weird_path = PathBuf::from("~user");
			assert_eq!(
				weird_path,
				expand_tidle(&weird_path).expect("Expected to return a SOME value")
			);
		}
	}

	mod to_absolute {
		use super::*;

		#[test]
		fn basic_func() {
			// fake home
			unsafe { std::env::set_var("HOME", "/custom/home") };

			let absolue_path = PathBuf::from("/absolute/to/path");
			assert_eq!(
				absolue_path,
				to_absolute(&absolue_path).expect("Expected to return a OK value")
			);

			assert_eq!(
				absolue_path,
				to_absolute("/absolute/to/inner/../path").expect("Expected to return a OK value")
			);

			assert_eq!(
				Path::join(&std::env::current_dir().expect("Expected to have a CWD"), "inner/path"),
				to_absolute("./inner/path").expect("Expected to return a OK value")
			);
		}
	}

	mod resolve_path_alias {
		use super::*;

		#[test]
		fn test_replace_alias() {
			assert_eq!(PathBuf::from("~/Downloads"), resolve_path_alias("下载"));
			assert_eq!(PathBuf::from("~/Documents"), resolve_path_alias("Documents"));
			assert_eq!(PathBuf::from("~/Music/sub"), resolve_path_alias("音乐/sub"));
			assert_eq!(PathBuf::from("~"), resolve_path_alias("HOME"));
			assert_eq!(PathBuf::from("./videos"), resolve_path_alias("current/videos"));
		}

		#[test]
		fn test_keep_partial_matches() {
			assert_eq!(PathBuf::from("/data/homework"), resolve_path_alias("/data/homework"));
			assert_eq!(PathBuf::from("my_music"), resolve_path_alias("my_music"));
		}

		#[test]
		fn test_keep_plain_paths() {
			assert_eq!(PathBuf::from("/tmp/out"), resolve_path_alias("/tmp/out"));
			assert_eq!(PathBuf::from("~/Videos"), resolve_path_alias("~/Videos"));
		}
	}

	#[test]
	fn test_ensure_dir() {
		let tmp = tempfile::Builder::new()
			.prefix("vidfetch-test-ensure")
			.tempdir()
			.expect("Expected a temp dir to be created");

		let target = tmp.path().join("a/b/c");
		let res = ensure_dir(&target).expect("Expected ensure_dir to succeed");

		assert_eq!(target, res);
		assert!(target.is_dir());

		// existing file is not a directory
		let file = tmp.path().join("file");
		std::fs::write(&file, "").expect("Expected file write to succeed");
		assert!(ensure_dir(&file).is_err());
	}

	#[test]
	fn test_sanitize_filename() {
		assert_eq!("ab cd", sanitize_filename(" a<b> c:d? "));
		assert_eq!("normal title", sanitize_filename("normal title"));
		assert_eq!(200, sanitize_filename(&"x".repeat(300)).chars().count());
		assert_eq!(200, sanitize_filename(&"视".repeat(250)).chars().count());
	}

	#[test]
	fn test_sanitize_dir_name() {
		assert_eq!("a_b_c", sanitize_dir_name("a/b\\c"));
		assert_eq!("unnamed", sanitize_dir_name("   "));
		assert_eq!("unnamed", sanitize_dir_name(""));
		assert_eq!(100, sanitize_dir_name(&"y".repeat(150)).chars().count());
	}

	#[test]
	fn test_unique_path() {
		let tmp = tempfile::Builder::new()
			.prefix("vidfetch-test-unique")
			.tempdir()
			.expect("Expected a temp dir to be created");

		let base = tmp.path().join("video.mp4");
		assert_eq!(Some(base.clone()), unique_path(&base));

		std::fs::write(&base, "").expect("Expected file write to succeed");
		assert_eq!(Some(tmp.path().join("video (1).mp4")), unique_path(&base));

		std::fs::write(tmp.path().join("video (1).mp4"), "").expect("Expected file write to succeed");
		assert_eq!(Some(tmp.path().join("video (2).mp4")), unique_path(&base));

		let no_ext = tmp.path().join("noext");
		std::fs::write(&no_ext, "").expect("Expected file write to succeed");
		assert_eq!(Some(tmp.path().join("noext (1)")), unique_path(&no_ext));
	}

	#[test]
	fn test_thousands() {
		assert_eq!("0", thousands(0));
		assert_eq!("999", thousands(999));
		assert_eq!("1,000", thousands(1000));
		assert_eq!("1,234,567", thousands(1_234_567));
	}
}
