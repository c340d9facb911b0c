//! Login-state detection and recovery.
//!
//! The authenticator moves through [`AuthState`]:
//!
//! ```text
//! Unknown -> CheckingAuth -> LoggedIn
//!                         -> NeedsLogin -> Authenticating -> LoggedIn
//!                                                         -> Failed
//! ```
//!
//! An already signed-in page is left untouched. Otherwise the login page is
//! reached through a rendered "Log in" button, or by navigating to the login
//! URL directly, and the credential form is driven one retried step at a time.

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::driver::{ElementRef, PageDriver, WaitUntil};
use crate::error::{ChatError, Result};
use crate::locator::LocatorKey;
use crate::retry::retry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
	#[default]
	Unknown,
	CheckingAuth,
	LoggedIn,
	NeedsLogin,
	Authenticating,
	Failed,
}

impl fmt::Display for AuthState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			AuthState::Unknown => "unknown",
			AuthState::CheckingAuth => "checking",
			AuthState::LoggedIn => "logged-in",
			AuthState::NeedsLogin => "needs-login",
			AuthState::Authenticating => "authenticating",
			AuthState::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// How the login form is reached once a login is required.
#[derive(Debug)]
enum LoginEntry {
	/// Rendered "Log in" affordances, in document order.
	Buttons(Vec<ElementRef>),
	/// Detection itself failed; go straight to the login URL.
	Direct,
}

pub struct SessionAuthenticator<'a> {
	config: &'a ChatConfig,
	state: AuthState,
}

impl<'a> SessionAuthenticator<'a> {
	pub fn new(config: &'a ChatConfig) -> Self {
		Self {
			config,
			state: AuthState::Unknown,
		}
	}

	pub fn state(&self) -> AuthState {
		self.state
	}

	fn transition(&mut self, next: AuthState) {
		debug!(target = "pw-chat", from = %self.state, to = %next, "auth state");
		self.state = next;
	}

	/// Makes sure the page is signed in, logging in when needed.
	///
	/// Returns [`AuthState::LoggedIn`] or an [`ChatError::Authentication`] error,
	/// after which [`state`](Self::state) reports [`AuthState::Failed`].
	pub async fn ensure_authenticated(&mut self, page: &dyn PageDriver) -> Result<AuthState> {
		self.transition(AuthState::CheckingAuth);

		let Some(entry) = self.detect(page).await else {
			info!(target = "pw-chat", "no login button found, already signed in");
			self.transition(AuthState::LoggedIn);
			return Ok(self.state);
		};

		self.transition(AuthState::NeedsLogin);
		match self.login(page, entry).await {
			Ok(()) => {
				info!(target = "pw-chat", "login flow complete");
				self.transition(AuthState::LoggedIn);
				Ok(self.state)
			}
			Err(err) => {
				self.transition(AuthState::Failed);
				Err(err)
			}
		}
	}

	/// `None` when signed in, otherwise how to reach the login form.
	async fn detect(&self, page: &dyn PageDriver) -> Option<LoginEntry> {
		if let Err(err) = page.wait_for_network_idle(self.config.timeouts.auth_idle).await {
			warn!(target = "pw-chat", error = %err, "could not detect login state, using login URL");
			return Some(LoginEntry::Direct);
		}

		let login = self.config.locators.get(LocatorKey::LoginBtn);
		match page.query_all(&login.selector).await {
			Ok(buttons) if buttons.is_empty() => None,
			Ok(buttons) => Some(LoginEntry::Buttons(buttons)),
			Err(err) => {
				warn!(target = "pw-chat", error = %err, "login button query failed, using login URL");
				Some(LoginEntry::Direct)
			}
		}
	}

	async fn login(&mut self, page: &dyn PageDriver, entry: LoginEntry) -> Result<()> {
		let config = self.config;
		let credentials = config
			.credentials
			.as_ref()
			.ok_or_else(|| ChatError::authentication("credentials", ChatError::MissingCredentials))?;

		let clicked = match entry {
			LoginEntry::Buttons(buttons) => self.click_any(page, &buttons).await,
			LoginEntry::Direct => false,
		};
		if !clicked {
			info!(target = "pw-chat", url = %config.login_url, "navigating directly to login page");
			page.navigate(&config.login_url, WaitUntil::NetworkIdle, config.timeouts.login_navigation)
				.await
				.map_err(|e| ChatError::authentication("login navigation", e))?;
		}

		self.transition(AuthState::Authenticating);
		info!(target = "pw-chat", "performing email/password login flow");

		let locators = &config.locators;
		let policy = &config.retry;
		let email = locators.get(LocatorKey::EmailInput);
		let password = locators.get(LocatorKey::PasswordIn);
		let cont = locators.get(LocatorKey::ContinueBtn);
		let identity = credentials.identity.as_str();
		let secret = credentials.secret.as_str();

		retry(policy, "fill identity", move || async move {
			page.fill(&email.selector, identity, email.timeout).await
		})
		.await
		.map_err(|e| ChatError::authentication("identity", e))?;

		retry(policy, "continue after identity", move || async move { page.click(&cont.selector, cont.timeout).await })
			.await
			.map_err(|e| ChatError::authentication("identity", e))?;

		retry(policy, "fill secret", move || async move {
			page.fill(&password.selector, secret, password.timeout).await
		})
		.await
		.map_err(|e| ChatError::authentication("secret", e))?;

		retry(policy, "continue after secret", move || async move { page.click(&cont.selector, cont.timeout).await })
			.await
			.map_err(|e| ChatError::authentication("secret", e))?;

		page.wait_for_network_idle(config.timeouts.auth_idle)
			.await
			.map_err(|e| ChatError::authentication("confirmation", e))
	}

	/// Clicks the buttons in order until one works.
	async fn click_any(&self, page: &dyn PageDriver, buttons: &[ElementRef]) -> bool {
		info!(target = "pw-chat", count = buttons.len(), "found login button(s), attempting clicks");
		let timeout = self.config.locators.get(LocatorKey::LoginBtn).timeout;

		for (idx, button) in buttons.iter().enumerate() {
			match page.click_element(button, timeout).await {
				Ok(()) => {
					info!(target = "pw-chat", button = idx + 1, "clicked login button");
					return true;
				}
				Err(err) => warn!(target = "pw-chat", button = idx + 1, error = %err, "login button click failed"),
			}
		}

		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Credentials;
	use crate::locator::Selector;
	use crate::retry::RetryPolicy;
	use crate::testing::{MockAction, MockEffect, MockFailure, MockOp, MockPage, MockTrigger};

	fn config() -> ChatConfig {
		ChatConfig {
			credentials: Some(Credentials::new("u@x.com", "pw")),
			retry: RetryPolicy::immediate(3),
			..ChatConfig::default()
		}
	}

	fn sel(cfg: &ChatConfig, key: LocatorKey) -> Selector {
		cfg.locators.get(key).selector.clone()
	}

	fn login_form(page: &MockPage, cfg: &ChatConfig) {
		page.show(&sel(cfg, LocatorKey::EmailInput), [""]);
		page.show(&sel(cfg, LocatorKey::PasswordIn), [""]);
		page.show(&sel(cfg, LocatorKey::ContinueBtn), ["Continue"]);
	}

	#[tokio::test]
	async fn signed_in_page_is_left_alone() {
		let cfg = config();
		let page = MockPage::new();

		let mut auth = SessionAuthenticator::new(&cfg);
		let state = auth.ensure_authenticated(&page).await.unwrap();

		assert_eq!(state, AuthState::LoggedIn);
		assert_eq!(page.actions(), vec![MockAction::NetworkIdle]);
	}

	#[tokio::test]
	async fn performs_four_step_flow_after_login_click() {
		let cfg = config();
		let page = MockPage::new();
		page.show(&sel(&cfg, LocatorKey::LoginBtn), ["Log in"]);
		login_form(&page, &cfg);

		let mut auth = SessionAuthenticator::new(&cfg);
		assert_eq!(auth.ensure_authenticated(&page).await.unwrap(), AuthState::LoggedIn);

		assert_eq!(
			page.fills(),
			vec![
				(sel(&cfg, LocatorKey::EmailInput).to_string(), "u@x.com".to_string()),
				(sel(&cfg, LocatorKey::PasswordIn).to_string(), "pw".to_string()),
			]
		);
		assert_eq!(page.clicks_on(&sel(&cfg, LocatorKey::LoginBtn)), 1);
		assert_eq!(page.clicks_on(&sel(&cfg, LocatorKey::ContinueBtn)), 2);
		assert!(!page.actions().iter().any(|a| matches!(a, MockAction::Navigate { .. })));
	}

	#[tokio::test]
	async fn tries_next_login_button_when_one_fails() {
		let cfg = config();
		let page = MockPage::new();
		let login = sel(&cfg, LocatorKey::LoginBtn);
		page.show(&login, ["Log in", "Log in"]);
		page.fail(MockOp::Click, &login, 1, MockFailure::Transient);
		login_form(&page, &cfg);

		let mut auth = SessionAuthenticator::new(&cfg);
		auth.ensure_authenticated(&page).await.unwrap();

		assert!(page.actions().contains(&MockAction::Click {
			selector: login.to_string(),
			index: 1
		}));
	}

	#[tokio::test]
	async fn navigates_to_login_url_when_every_button_fails() {
		let cfg = config();
		let page = MockPage::new();
		let login = sel(&cfg, LocatorKey::LoginBtn);
		page.show(&login, ["Log in", "Log in"]);
		page.fail(MockOp::Click, &login, 2, MockFailure::Transient);
		login_form(&page, &cfg);

		let mut auth = SessionAuthenticator::new(&cfg);
		auth.ensure_authenticated(&page).await.unwrap();

		assert_eq!(page.url(), cfg.login_url);
		assert_eq!(page.fills().len(), 2);
	}

	#[tokio::test]
	async fn failed_detection_goes_straight_to_login_url() {
		let cfg = config();
		let page = MockPage::new();
		page.fail_network_idle(1);
		// A login button that must not be clicked once detection has failed.
		page.show(&sel(&cfg, LocatorKey::LoginBtn), ["Log in"]);
		login_form(&page, &cfg);

		let mut auth = SessionAuthenticator::new(&cfg);
		assert_eq!(auth.ensure_authenticated(&page).await.unwrap(), AuthState::LoggedIn);

		assert_eq!(page.url(), cfg.login_url);
		assert_eq!(page.clicks_on(&sel(&cfg, LocatorKey::LoginBtn)), 0);
	}

	#[tokio::test]
	async fn credential_steps_are_retried() {
		let cfg = config();
		let page = MockPage::new();
		page.show(&sel(&cfg, LocatorKey::LoginBtn), ["Log in"]);
		login_form(&page, &cfg);
		page.fail(MockOp::Fill, sel(&cfg, LocatorKey::EmailInput), 2, MockFailure::Transient);

		let mut auth = SessionAuthenticator::new(&cfg);
		auth.ensure_authenticated(&page).await.unwrap();

		assert_eq!(page.fills().len(), 2);
	}

	#[tokio::test]
	async fn lost_context_during_credential_step_is_retried() {
		let cfg = config();
		let page = MockPage::new();
		page.show(&sel(&cfg, LocatorKey::LoginBtn), ["Log in"]);
		login_form(&page, &cfg);
		page.fail(MockOp::WaitFor, sel(&cfg, LocatorKey::EmailInput), 1, MockFailure::ContextLost);
		page.fail(MockOp::WaitFor, sel(&cfg, LocatorKey::PasswordIn), 1, MockFailure::ContextLost);

		let mut auth = SessionAuthenticator::new(&cfg);
		assert_eq!(auth.ensure_authenticated(&page).await.unwrap(), AuthState::LoggedIn);

		assert_eq!(page.fills().len(), 2);
	}

	#[tokio::test]
	async fn failed_login_navigation_is_an_authentication_error() {
		let cfg = config();
		let page = MockPage::new();
		let login = sel(&cfg, LocatorKey::LoginBtn);
		page.show(&login, ["Log in"]);
		page.fail(MockOp::Click, &login, 1, MockFailure::Transient);
		page.fail(MockOp::Navigate, &cfg.login_url, 1, MockFailure::Transient);
		login_form(&page, &cfg);

		let mut auth = SessionAuthenticator::new(&cfg);
		let err = auth.ensure_authenticated(&page).await.unwrap_err();

		assert_eq!(auth.state(), AuthState::Failed);
		match err {
			ChatError::Authentication { stage, source } => {
				assert_eq!(stage, "login navigation");
				assert!(matches!(*source, ChatError::Navigation { .. }));
			}
			other => panic!("unexpected error: {other:?}"),
		}
		assert!(page.fills().is_empty());
	}

	#[tokio::test]
	async fn unsettled_page_after_submit_fails_confirmation() {
		let cfg = config();
		let page = MockPage::new();
		page.show(&sel(&cfg, LocatorKey::LoginBtn), ["Log in"]);
		login_form(&page, &cfg);
		// Detection settles, the post-login idle wait does not.
		page.fail_after(MockOp::NetworkIdle, "", 1, 1, MockFailure::Transient);

		let mut auth = SessionAuthenticator::new(&cfg);
		let err = auth.ensure_authenticated(&page).await.unwrap_err();

		assert_eq!(auth.state(), AuthState::Failed);
		assert!(matches!(err, ChatError::Authentication { stage: "confirmation", .. }), "unexpected error: {err:?}");
		assert_eq!(page.fills().len(), 2);
		assert_eq!(page.clicks_on(&sel(&cfg, LocatorKey::ContinueBtn)), 2);
	}

	#[tokio::test]
	async fn exhausted_step_surfaces_as_authentication_error() {
		let cfg = config();
		let page = MockPage::new();
		page.show(&sel(&cfg, LocatorKey::LoginBtn), ["Log in"]);
		page.show(&sel(&cfg, LocatorKey::EmailInput), [""]);

		let mut auth = SessionAuthenticator::new(&cfg);
		let err = auth.ensure_authenticated(&page).await.unwrap_err();

		assert_eq!(auth.state(), AuthState::Failed);
		match err {
			ChatError::Authentication { stage, source } => {
				assert_eq!(stage, "identity");
				assert!(matches!(*source, ChatError::Timeout { .. }));
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn missing_credentials_fail_without_touching_the_page() {
		let cfg = ChatConfig {
			credentials: None,
			..config()
		};
		let page = MockPage::new();
		page.show(&sel(&cfg, LocatorKey::LoginBtn), ["Log in"]);

		let mut auth = SessionAuthenticator::new(&cfg);
		let err = auth.ensure_authenticated(&page).await.unwrap_err();

		assert!(matches!(err, ChatError::Authentication { stage: "credentials", .. }));
		assert_eq!(page.clicks_on(&sel(&cfg, LocatorKey::LoginBtn)), 0);
	}

	#[tokio::test]
	async fn login_form_revealed_by_click_is_used() {
		let cfg = config();
		let page = MockPage::new();
		let login = sel(&cfg, LocatorKey::LoginBtn);
		page.show(&login, ["Log in"]);
		page.on(
			MockTrigger::click(&login),
			[
				MockEffect::hide(&login),
				MockEffect::show(&sel(&cfg, LocatorKey::EmailInput)),
				MockEffect::show(&sel(&cfg, LocatorKey::PasswordIn)),
				MockEffect::show(&sel(&cfg, LocatorKey::ContinueBtn)),
			],
		);

		let mut auth = SessionAuthenticator::new(&cfg);
		assert_eq!(auth.ensure_authenticated(&page).await.unwrap(), AuthState::LoggedIn);
	}
}
