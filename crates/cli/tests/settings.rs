//! Layering of defaults, settings file, environment and flags.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pw_chat::{DEFAULT_TARGET_URL, LocatorKey, Selector};
use pw_chat_cli::cli::{Cli, WindowSize};
use pw_chat_cli::error::CliError;
use pw_chat_cli::settings::{DEFAULT_WINDOW, Settings, default_profile_dir};

fn cli(args: &[&str]) -> Cli {
	let mut argv = vec!["pw-chat"];
	argv.extend_from_slice(args);
	Cli::try_parse_from(argv).unwrap()
}

fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
	let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
	move |name| vars.get(name).cloned()
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
	let path = dir.path().join("pw-chat.toml");
	std::fs::write(&path, body).unwrap();
	path
}

#[test]
fn defaults_without_any_layer() -> anyhow::Result<()> {
	let settings = Settings::load(&cli(&["Hello"]), env(&[]))?;

	assert_eq!(settings.chat.target_url, DEFAULT_TARGET_URL);
	assert!(settings.chat.credentials.is_none());
	assert_eq!(settings.launch.profile_dir, default_profile_dir());
	assert_eq!(settings.launch.window, DEFAULT_WINDOW);
	assert!(!settings.launch.headless);
	Ok(())
}

#[test]
fn file_overrides_defaults() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	let path = write_config(
		&dir,
		r#"
target_url = "https://chat.example.test"
headless = true

[viewport]
width = 1024
height = 768

[retry]
max_attempts = 5

[timeouts]
response_ms = 1000

[locators.ready]
selector = 'button:has-text("Send")'
timeout_ms = 3000
"#,
	);

	let settings = Settings::load(&cli(&["--config", path.to_str().unwrap(), "Hi"]), env(&[]))?;

	assert_eq!(settings.chat.target_url, "https://chat.example.test");
	assert!(settings.launch.headless);
	assert_eq!(
		settings.launch.window,
		WindowSize {
			width: 1024,
			height: 768
		}
	);
	assert_eq!(settings.chat.retry.max_attempts, 5);
	assert_eq!(settings.chat.timeouts.response, Duration::from_secs(1));

	let ready = settings.chat.locators.get(LocatorKey::Ready);
	assert_eq!(ready.selector, Selector::css("button").with_text("Send"));
	assert_eq!(ready.timeout, Duration::from_secs(3));
	Ok(())
}

#[test]
fn config_path_can_come_from_environment() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	let path = write_config(&dir, "login_url = \"https://login.example.test\"\n");

	let settings = Settings::load(&cli(&["Hi"]), env(&[("PW_CHAT_CONFIG", path.to_str().unwrap())]))?;
	assert_eq!(settings.chat.login_url, "https://login.example.test");
	Ok(())
}

#[test]
fn environment_overrides_file_and_flags_override_environment() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	let path = write_config(&dir, "target_url = \"https://file.example.test\"\nprofile_dir = \"/from/file\"\n");

	let vars = env(&[
		("CHAT_TARGET_URL", "https://env.example.test"),
		("CHAT_PROFILE_DIR", "/from/env"),
		("CHAT_EMAIL", "u@x.com"),
		("CHAT_PASSWORD", "pw"),
	]);
	let settings = Settings::load(
		&cli(&["--config", path.to_str().unwrap(), "--profile-dir", "/from/flag", "Hi"]),
		vars,
	)?;

	assert_eq!(settings.chat.target_url, "https://env.example.test");
	assert_eq!(settings.launch.profile_dir, PathBuf::from("/from/flag"));
	let creds = settings.chat.credentials.expect("credentials from environment");
	assert_eq!((creds.identity.as_str(), creds.secret.as_str()), ("u@x.com", "pw"));
	Ok(())
}

#[test]
fn legacy_profile_variable_is_honored() -> anyhow::Result<()> {
	let settings = Settings::load(&cli(&["Hi"]), env(&[("CAMOUFOX_PROFILE_DIR", "/legacy")]))?;
	assert_eq!(settings.launch.profile_dir, PathBuf::from("/legacy"));

	let settings = Settings::load(
		&cli(&["Hi"]),
		env(&[("CAMOUFOX_PROFILE_DIR", "/legacy"), ("CHAT_PROFILE_DIR", "/current")]),
	)?;
	assert_eq!(settings.launch.profile_dir, PathBuf::from("/current"));
	Ok(())
}

#[test]
fn partial_credentials_are_ignored() -> anyhow::Result<()> {
	let settings = Settings::load(&cli(&["Hi"]), env(&[("CHAT_EMAIL", "u@x.com")]))?;
	assert!(settings.chat.credentials.is_none());
	Ok(())
}

#[test]
fn unknown_locator_name_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_config(&dir, "[locators.send_btn]\nselector = \"button\"\n");

	let err = Settings::load(&cli(&["--config", path.to_str().unwrap(), "Hi"]), env(&[])).unwrap_err();
	assert!(err.to_string().contains("unknown locator `send_btn`"), "got: {err}");
}

#[test]
fn unknown_keys_fail_to_parse() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_config(&dir, "target = \"https://x.test\"\n");

	let err = Settings::load(&cli(&["--config", path.to_str().unwrap(), "Hi"]), env(&[])).unwrap_err();
	assert!(matches!(err, CliError::ConfigParse { .. }));
}

#[test]
fn missing_config_file_is_reported_with_path() {
	let err = Settings::load(&cli(&["--config", "/nonexistent/pw-chat.toml", "Hi"]), env(&[])).unwrap_err();
	match err {
		CliError::ConfigRead { path, .. } => assert_eq!(path, PathBuf::from("/nonexistent/pw-chat.toml")),
		other => panic!("unexpected error: {other:?}"),
	}
}

#[test]
fn invalid_urls_are_rejected() {
	let err = Settings::load(&cli(&["Hi"]), env(&[("CHAT_TARGET_URL", "not a url")])).unwrap_err();
	assert!(matches!(err, CliError::InvalidUrl { field: "target", .. }));

	let err = Settings::load(&cli(&["Hi"]), env(&[("CHAT_LOGIN_URL", "ftp://x.test")])).unwrap_err();
	assert!(matches!(err, CliError::Config(_)));
}

#[test]
fn window_size_flag_wins() -> anyhow::Result<()> {
	let settings = Settings::load(&cli(&["--window-size", "800x600", "--headless", "Hi"]), env(&[]))?;
	assert_eq!(
		settings.launch.window,
		WindowSize {
			width: 800,
			height: 600
		}
	);
	assert!(settings.launch.headless);
	Ok(())
}
