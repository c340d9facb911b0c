//! Layered run settings.
//!
//! Later layers win: built-in defaults, then the TOML file named by `--config`
//! or `PW_CHAT_CONFIG`, then environment variables (after `.env` is loaded),
//! then command-line flags. The result is immutable for the rest of the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pw_chat::{ChatConfig, Credentials, Locator, LocatorKey, Selector};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::cli::{Cli, WindowSize};
use crate::error::{CliError, Result};

pub const CONFIG_ENV: &str = "PW_CHAT_CONFIG";
pub const EMAIL_ENV: &str = "CHAT_EMAIL";
pub const PASSWORD_ENV: &str = "CHAT_PASSWORD";
pub const PROFILE_DIR_ENV: &str = "CHAT_PROFILE_DIR";
/// Profile variable honored for existing setups.
pub const LEGACY_PROFILE_DIR_ENV: &str = "CAMOUFOX_PROFILE_DIR";
pub const TARGET_URL_ENV: &str = "CHAT_TARGET_URL";
pub const LOGIN_URL_ENV: &str = "CHAT_LOGIN_URL";

pub const DEFAULT_WINDOW: WindowSize = WindowSize {
	width: 1280,
	height: 900,
};

/// Browser launch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
	/// Persistent profile, so cookies survive between runs.
	pub profile_dir: PathBuf,
	pub headless: bool,
	pub window: WindowSize,
}

impl Default for LaunchSettings {
	fn default() -> Self {
		Self {
			profile_dir: default_profile_dir(),
			headless: false,
			window: DEFAULT_WINDOW,
		}
	}
}

/// `<data_local_dir>/pw-chat/profile`, or under the temp dir when the platform has none.
pub fn default_profile_dir() -> PathBuf {
	dirs::data_local_dir()
		.unwrap_or_else(std::env::temp_dir)
		.join("pw-chat")
		.join("profile")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub chat: ChatConfig,
	pub launch: LaunchSettings,
}

/// On-disk settings file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
	pub target_url: Option<String>,
	pub login_url: Option<String>,
	pub profile_dir: Option<PathBuf>,
	pub headless: Option<bool>,
	pub viewport: Option<ViewportSection>,
	pub retry: Option<RetrySection>,
	pub timeouts: Option<TimeoutsSection>,
	#[serde(default)]
	pub locators: BTreeMap<String, LocatorSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewportSection {
	pub width: u32,
	pub height: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
	pub max_attempts: Option<u32>,
	pub base_delay_ms: Option<u64>,
	pub jitter_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsSection {
	pub navigation_ms: Option<u64>,
	pub initial_idle_ms: Option<u64>,
	pub auth_idle_ms: Option<u64>,
	pub login_navigation_ms: Option<u64>,
	pub conversation_click_ms: Option<u64>,
	pub response_ms: Option<u64>,
	pub settle_ms: Option<u64>,
	pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocatorSection {
	pub selector: Option<String>,
	pub timeout_ms: Option<u64>,
}

impl FileSettings {
	pub fn read(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
			path: path.to_path_buf(),
			source,
		})?;
		toml::from_str(&raw).map_err(|source| CliError::ConfigParse {
			path: path.to_path_buf(),
			source,
		})
	}

	fn apply(self, settings: &mut Settings) -> Result<()> {
		let chat = &mut settings.chat;
		if let Some(url) = self.target_url {
			chat.target_url = url;
		}
		if let Some(url) = self.login_url {
			chat.login_url = url;
		}
		if let Some(dir) = self.profile_dir {
			settings.launch.profile_dir = dir;
		}
		if let Some(headless) = self.headless {
			settings.launch.headless = headless;
		}
		if let Some(viewport) = self.viewport {
			settings.launch.window = WindowSize {
				width: viewport.width,
				height: viewport.height,
			};
		}

		if let Some(retry) = self.retry {
			let policy = &mut chat.retry;
			set(&mut policy.max_attempts, retry.max_attempts);
			set_ms(&mut policy.base_delay, retry.base_delay_ms);
			set_ms(&mut policy.jitter_bound, retry.jitter_ms);
		}

		if let Some(t) = self.timeouts {
			let timeouts = &mut chat.timeouts;
			set_ms(&mut timeouts.navigation, t.navigation_ms);
			set_ms(&mut timeouts.initial_idle, t.initial_idle_ms);
			set_ms(&mut timeouts.auth_idle, t.auth_idle_ms);
			set_ms(&mut timeouts.login_navigation, t.login_navigation_ms);
			set_ms(&mut timeouts.conversation_click, t.conversation_click_ms);
			set_ms(&mut timeouts.response, t.response_ms);
			set_ms(&mut timeouts.settle, t.settle_ms);
			set_ms(&mut timeouts.poll_interval, t.poll_interval_ms);
		}

		for (name, section) in self.locators {
			let key: LocatorKey = name.parse()?;
			let current = chat.locators.get(key);
			let selector = match section.selector {
				Some(raw) => raw.parse::<Selector>()?,
				None => current.selector.clone(),
			};
			let timeout = section.timeout_ms.map_or(current.timeout, Duration::from_millis);
			debug!(target = "pw-chat", locator = %key, %selector, "locator override");
			chat.locators.set(key, Locator { selector, timeout });
		}

		Ok(())
	}
}

fn set<T>(slot: &mut T, value: Option<T>) {
	if let Some(value) = value {
		*slot = value;
	}
}

fn set_ms(slot: &mut Duration, ms: Option<u64>) {
	set(slot, ms.map(Duration::from_millis));
}

/// Reads a process environment variable, treating empty values as unset.
pub fn process_env(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Settings {
	/// Resolves every layer. `env` looks up environment variables.
	pub fn load<E>(cli: &Cli, env: E) -> Result<Self>
	where
		E: Fn(&str) -> Option<String>,
	{
		let mut settings = Settings {
			chat: ChatConfig::default(),
			launch: LaunchSettings::default(),
		};

		if let Some(path) = cli.config.clone().or_else(|| env(CONFIG_ENV).map(PathBuf::from)) {
			debug!(target = "pw-chat", path = %path.display(), "loading settings file");
			FileSettings::read(&path)?.apply(&mut settings)?;
		}

		settings.apply_env(&env);
		settings.apply_flags(cli);
		settings.validate()?;
		Ok(settings)
	}

	fn apply_env<E>(&mut self, env: &E)
	where
		E: Fn(&str) -> Option<String>,
	{
		match (env(EMAIL_ENV), env(PASSWORD_ENV)) {
			(Some(identity), Some(secret)) => self.chat.credentials = Some(Credentials::new(identity, secret)),
			(None, None) => {}
			_ => warn!(
				target = "pw-chat",
				"only one of {EMAIL_ENV} and {PASSWORD_ENV} is set, ignoring credentials"
			),
		}

		if let Some(dir) = env(PROFILE_DIR_ENV).or_else(|| env(LEGACY_PROFILE_DIR_ENV)) {
			self.launch.profile_dir = PathBuf::from(dir);
		}
		if let Some(url) = env(TARGET_URL_ENV) {
			self.chat.target_url = url;
		}
		if let Some(url) = env(LOGIN_URL_ENV) {
			self.chat.login_url = url;
		}
	}

	fn apply_flags(&mut self, cli: &Cli) {
		if let Some(dir) = &cli.profile_dir {
			self.launch.profile_dir = dir.clone();
		}
		if cli.headless {
			self.launch.headless = true;
		}
		if let Some(size) = cli.window_size {
			self.launch.window = size;
		}
	}

	fn validate(&self) -> Result<()> {
		check_url("target", &self.chat.target_url)?;
		check_url("login", &self.chat.login_url)?;
		if self.launch.window.width == 0 || self.launch.window.height == 0 {
			return Err(CliError::Config(format!("window size {} must be non-zero", self.launch.window)));
		}
		Ok(())
	}
}

fn check_url(field: &'static str, value: &str) -> Result<()> {
	let parsed = Url::parse(value).map_err(|source| CliError::InvalidUrl {
		field,
		value: value.to_string(),
		source,
	})?;
	match parsed.scheme() {
		"http" | "https" => Ok(()),
		other => Err(CliError::Config(format!("{field} URL `{value}` must use http or https, not {other}"))),
	}
}
