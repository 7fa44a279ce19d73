use colored::{
	Color,
	Colorize,
};
use libvidfetch::main::cookies::{
	COOKIE_SITES,
	CookieStore,
};

use crate::clap_conf::{
	CliDerive,
	CommandCookies,
	CookiesImport,
	CookiesRemove,
	CookiesSubCommands,
};

/// Handler function for the "cookies" subcommand
/// This function is mainly to keep the code structured and sorted
#[inline]
pub fn command_cookies(_main_args: &CliDerive, sub_args: &CommandCookies) -> Result<(), crate::Error> {
	let Some(store) = sub_args.cookie_store() else {
		return Err(crate::Error::other(
			"Could not determine a config directory, please use --cookies-dir",
		));
	};

	match &sub_args.subcommands {
		CookiesSubCommands::List => cookies_list(&store),
		CookiesSubCommands::Import(v) => cookies_import(&store, v),
		CookiesSubCommands::Remove(v) => cookies_remove(&store, v),
	}?;

	return Ok(());
}

/// Print all saved cookie files and which known sites still have none
fn cookies_list(store: &CookieStore) -> Result<(), crate::Error> {
	let saved = store.list()?;

	if saved.is_empty() {
		println!("No saved cookies in \"{}\"", store.dir().display());
	} else {
		println!("Saved cookies in \"{}\":", store.dir().display());
		for (domain, path) in &saved {
			println!("  {domain}: {}", path.display());
		}
	}

	let missing = missing_sites(&saved);

	if !missing.is_empty() {
		println!("Sites that usually require cookies but have none saved:");
		for line in missing {
			println!("  {}", line.color(Color::Yellow));
		}
	}

	return Ok(());
}

/// Get a line for every known cookie site that has no saved file in `saved`
fn missing_sites(saved: &[(String, std::path::PathBuf)]) -> Vec<String> {
	return COOKIE_SITES
		.iter()
		.filter(|site| return !saved.iter().any(|(domain, _)| return domain == site.domain))
		.map(|site| return format!("{} ({})", site.name, site.domain))
		.collect();
}

/// Import a cookie file into the store
fn cookies_import(store: &CookieStore, args: &CookiesImport) -> Result<(), crate::Error> {
	let target = store.import(&args.file_path, &args.domain)?;

	println!(
		"Imported cookies for \"{}\" to \"{}\"",
		args.domain,
		target.display()
	);

	return Ok(());
}

/// Remove a saved cookie file from the store
fn cookies_remove(store: &CookieStore, args: &CookiesRemove) -> Result<(), crate::Error> {
	if store.remove(&args.domain)? {
		println!("Removed cookies for \"{}\"", args.domain);
	} else {
		println!("No saved cookies for \"{}\"", args.domain);
	}

	return Ok(());
}
