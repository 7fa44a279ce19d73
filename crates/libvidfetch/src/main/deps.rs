//! Module for checking and installing the external binaries vidfetch depends on

use std::{
	path::{
		Path,
		PathBuf,
	},
	time::Duration,
};

use crate::spawn::{
	ffmpeg::{
		FFMPEG_BIN_NAME,
		FFPROBE_BIN_NAME,
		ffmpeg_version,
		ffprobe_version,
	},
	wait_with_timeout,
	ytdl::{
		YTDL_BIN_NAME,
		ytdl_version,
	},
};

/// Timeout for installing yt-dlp via pip
const PIP_INSTALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Timeout for installing ffmpeg via a system package manager
const PACKAGE_INSTALL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// A external binary vidfetch depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
	YtDlp,
	Ffmpeg,
	Ffprobe,
}

impl Dependency {
	/// All dependencies, in the order they should be shown
	pub const ALL: [Self; 3] = [Self::YtDlp, Self::Ffmpeg, Self::Ffprobe];

	/// Name of the binary to spawn
	pub fn bin_name(&self) -> &'static str {
		return match self {
			Self::YtDlp => YTDL_BIN_NAME,
			Self::Ffmpeg => FFMPEG_BIN_NAME,
			Self::Ffprobe => FFPROBE_BIN_NAME,
		};
	}

	/// Get whether downloading is impossible without this dependency
	/// ffmpeg and ffprobe are only needed for merging and converting
	pub fn is_required(&self) -> bool {
		return matches!(self, Self::YtDlp);
	}

	/// Get the version of the installed binary
	pub fn version(&self) -> Result<String, crate::Error> {
		return match self {
			Self::YtDlp => ytdl_version(),
			Self::Ffmpeg => ffmpeg_version(),
			Self::Ffprobe => ffprobe_version(),
		};
	}
}

impl std::fmt::Display for Dependency {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		return f.write_str(self.bin_name());
	}
}

/// Result of checking a single [Dependency]
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyStatus {
	pub dependency: Dependency,
	/// Path the binary was found at in "PATH"
	pub path:       Option<PathBuf>,
	/// Version, if it could be determined
	pub version:    Option<String>,
}

impl DependencyStatus {
	/// Get whether the dependency is installed
	pub fn installed(&self) -> bool {
		return self.path.is_some();
	}
}

/// Find the executable `bin` in the directories of `path_var` (formatted like "PATH")
/// On windows all extensions of "PATHEXT" are tried
pub fn find_in_dirs(bin: &str, path_var: &std::ffi::OsStr) -> Option<PathBuf> {
	return which::which_in(bin, Some(path_var), Path::new(".")).ok();
}

/// Find the executable `bin` in the "PATH" of the current process
pub fn find_in_path(bin: &str) -> Option<PathBuf> {
	return which::which(bin).ok();
}

/// Check if `dep` is installed and get its version
pub fn check_dependency(dep: Dependency) -> DependencyStatus {
	let path = find_in_path(dep.bin_name());

	let version = if path.is_some() {
		match dep.version() {
			Ok(v) => Some(v),
			Err(err) => {
				debug!("Could not determine version of {}: {}", dep, err);
				None
			},
		}
	} else {
		None
	};

	return DependencyStatus {
		dependency: dep,
		path,
		version,
	};
}

/// Check all [Dependency::ALL]
pub fn check_all() -> Vec<DependencyStatus> {
	return Dependency::ALL.into_iter().map(check_dependency).collect();
}

/// Get the command to install `dep` on `os` (as in [std::env::consts::OS])
///
/// `has_bin` is used to detect the available package manager
/// Returns [`None`] if no supported installation method exists
pub fn install_command<F: Fn(&str) -> bool>(dep: Dependency, os: &str, has_bin: F) -> Option<Vec<String>> {
	fn to_vec(v: &[&str]) -> Vec<String> {
		return v.iter().map(|v| return (*v).to_owned()).collect();
	}

	if dep == Dependency::YtDlp {
		let python = if os == "windows" { "python" } else { "python3" };

		if !has_bin(python) {
			return None;
		}

		return Some(to_vec(&[python, "-m", "pip", "install", "--upgrade", "yt-dlp"]));
	}

	// ffprobe is always packaged together with ffmpeg
	return match os {
		"macos" => has_bin("brew").then(|| return to_vec(&["brew", "install", "ffmpeg"])),
		"linux" => [
			("apt", to_vec(&["sudo", "apt", "install", "-y", "ffmpeg"])),
			("dnf", to_vec(&["sudo", "dnf", "install", "-y", "ffmpeg"])),
			("pacman", to_vec(&["sudo", "pacman", "-S", "--noconfirm", "ffmpeg"])),
		]
		.into_iter()
		.find(|(pm, _)| return has_bin(*pm))
		.map(|(_, cmd)| return cmd),
		"windows" => {
			has_bin("winget").then(|| return to_vec(&["winget", "install", "ffmpeg", "--accept-source-agreements"]))
		},
		_ => None,
	};
}

/// Try to install `dep` with the methods of [install_command] for the current system
pub fn install_dependency(dep: Dependency) -> Result<(), crate::Error> {
	let Some(command) = install_command(dep, std::env::consts::OS, |bin| return find_in_path(bin).is_some()) else {
		return Err(crate::Error::other(format!(
			"No supported installation method for {dep} found, please install it manually"
		)));
	};

	let Some((program, args)) = command.split_first() else {
		return Err(crate::Error::other("Empty install command"));
	};

	info!("Installing {} via \"{}\"", dep, command.join(" "));

	let timeout = if dep == Dependency::YtDlp {
		PIP_INSTALL_TIMEOUT
	} else {
		PACKAGE_INSTALL_TIMEOUT
	};

	let output = wait_with_timeout(duct::cmd(program.as_str(), args), timeout, program)?;

	if !output.success {
		return Err(crate::Error::command_unsuccessful(format!(
			"Installing {dep} failed: {}",
			output.stderr.trim()
		)));
	}

	return Ok(());
}
