use colored::{
	Color,
	Colorize,
};
use libvidfetch::main::deps::{
	DependencyStatus,
	check_all,
	install_dependency,
};

use crate::clap_conf::{
	CliDerive,
	CommandDeps,
};

/// Handler function for the "deps" subcommand
/// This function is mainly to keep the code structured and sorted
#[inline]
pub fn command_deps(_main_args: &CliDerive, sub_args: &CommandDeps) -> Result<(), crate::Error> {
	let mut statuses = check_all();
	print_statuses(&statuses);

	if sub_args.install {
		let mut installed_any = false;

		for status in statuses.iter().filter(|v| return !v.installed()) {
			println!("Installing {}", status.dependency);

			match install_dependency(status.dependency) {
				Ok(()) => installed_any = true,
				Err(err) => println!("{}", format!("Installing {} failed: {err}", status.dependency).color(Color::Red)),
			}
		}

		if installed_any {
			statuses = check_all();
			print_statuses(&statuses);
		}
	} else if statuses.iter().any(|v| return !v.installed()) {
		println!("Run \"vidfetch deps --install\" to try installing the missing programs");
	}

	let missing_required: Vec<String> = statuses
		.iter()
		.filter(|v| return v.dependency.is_required() && !v.installed())
		.map(|v| return v.dependency.to_string())
		.collect();

	if !missing_required.is_empty() {
		return Err(crate::Error::other(format!(
			"Required programs are missing: {}",
			missing_required.join(", ")
		)));
	}

	return Ok(());
}

/// Print one line per status
fn print_statuses(statuses: &[DependencyStatus]) {
	for status in statuses {
		println!("{}", status_line(status));
	}
}

/// Format the line for a single dependency
fn status_line(status: &DependencyStatus) -> String {
	let Some(path) = &status.path else {
		let kind = if status.dependency.is_required() {
			"required"
		} else {
			"optional, needed for merging and converting"
		};

		return format!("{} {} ({kind})", "missing".color(Color::Red), status.dependency);
	};

	let version = status.version.as_deref().unwrap_or("unknown version");

	return format!(
		"{} {} {version} ({})",
		"found".color(Color::Green),
		status.dependency,
		path.display()
	);
}
