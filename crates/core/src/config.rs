//! Run configuration handed to the [`crate::Orchestrator`] at construction.

use std::fmt;
use std::time::Duration;

use crate::locator::LocatorTable;
use crate::retry::RetryPolicy;

pub const DEFAULT_TARGET_URL: &str = "https://chat.openai.com";
pub const DEFAULT_LOGIN_URL: &str = "https://auth.openai.com/log-in";

/// Login identity and secret. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	pub identity: String,
	pub secret: String,
}

impl Credentials {
	pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
		Self {
			identity: identity.into(),
			secret: secret.into(),
		}
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("identity", &self.identity)
			.field("secret", &"<redacted>")
			.finish()
	}
}

/// Waits that are not tied to a single locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
	/// Initial navigation to the chat page.
	pub navigation: Duration,
	/// Network-idle wait after the initial navigation.
	pub initial_idle: Duration,
	/// Network-idle waits around the login flow.
	pub auth_idle: Duration,
	/// Direct navigation to the login page.
	pub login_navigation: Duration,
	/// Click on a conversation title.
	pub conversation_click: Duration,
	/// Budget for each phase of the completion wait.
	pub response: Duration,
	/// Pause between completion and extraction.
	pub settle: Duration,
	/// Interval between completion checks.
	pub poll_interval: Duration,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			navigation: Duration::from_secs(60),
			initial_idle: Duration::from_secs(60),
			auth_idle: Duration::from_secs(20),
			login_navigation: Duration::from_secs(60),
			conversation_click: Duration::from_secs(5),
			response: Duration::from_secs(200),
			settle: Duration::from_secs(5),
			poll_interval: Duration::from_millis(250),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
	pub target_url: String,
	pub login_url: String,
	pub credentials: Option<Credentials>,
	pub locators: LocatorTable,
	pub retry: RetryPolicy,
	pub timeouts: Timeouts,
}

impl Default for ChatConfig {
	fn default() -> Self {
		Self {
			target_url: DEFAULT_TARGET_URL.to_string(),
			login_url: DEFAULT_LOGIN_URL.to_string(),
			credentials: None,
			locators: LocatorTable::default(),
			retry: RetryPolicy::default(),
			timeouts: Timeouts::default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credentials_debug_redacts_secret() {
		let creds = Credentials::new("u@x.com", "hunter2");
		let rendered = format!("{creds:?}");
		assert!(rendered.contains("u@x.com"));
		assert!(!rendered.contains("hunter2"));
	}

	#[test]
	fn defaults_point_at_hosted_chat() {
		let cfg = ChatConfig::default();
		assert_eq!(cfg.target_url, DEFAULT_TARGET_URL);
		assert_eq!(cfg.login_url, DEFAULT_LOGIN_URL);
		assert!(cfg.credentials.is_none());
		assert_eq!(cfg.timeouts.response, Duration::from_secs(200));
	}
}
