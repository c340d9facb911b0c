//! Named element locators and the selector syntax they use.
//!
//! A [`Selector`] is a CSS selector with an optional `:has-text("...")` suffix,
//! the same shorthand Playwright accepts. The text filter is applied by the
//! driver against the element's rendered text (case-insensitive, whitespace
//! collapsed), so drivers without native text engines can still honour it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ChatError;

const HAS_TEXT: &str = ":has-text(";

/// CSS selector plus optional rendered-text filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
	css: String,
	has_text: Option<String>,
}

impl Selector {
	pub fn css(css: impl Into<String>) -> Self {
		Self {
			css: css.into(),
			has_text: None,
		}
	}

	/// Narrows the selector to elements whose rendered text contains `text`.
	pub fn with_text(mut self, text: impl Into<String>) -> Self {
		self.has_text = Some(text.into());
		self
	}

	pub fn css_part(&self) -> &str {
		&self.css
	}

	pub fn text_filter(&self) -> Option<&str> {
		self.has_text.as_deref()
	}

	/// Returns true when `rendered` satisfies the text filter (always true without one).
	pub fn matches_text(&self, rendered: &str) -> bool {
		match &self.has_text {
			Some(needle) => normalize(rendered).contains(&normalize(needle)),
			None => true,
		}
	}
}

fn normalize(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl FromStr for Selector {
	type Err = ChatError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let raw = raw.trim();
		if raw.is_empty() {
			return Err(ChatError::Config("selector must not be empty".into()));
		}

		let Some(start) = raw.find(HAS_TEXT) else {
			return Ok(Selector::css(raw));
		};

		let css = raw[..start].trim();
		let rest = &raw[start + HAS_TEXT.len()..];
		let inner = rest
			.strip_suffix(')')
			.ok_or_else(|| ChatError::Config(format!("unterminated :has-text in selector `{raw}`")))?;
		let text = unquote(inner.trim()).ok_or_else(|| ChatError::Config(format!("unquoted :has-text argument in selector `{raw}`")))?;

		if css.is_empty() {
			return Err(ChatError::Config(format!("selector `{raw}` has no CSS part")));
		}

		Ok(Selector::css(css).with_text(text))
	}
}

fn unquote(value: &str) -> Option<&str> {
	['"', '\''].iter().find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.has_text {
			Some(text) => write!(f, "{}{HAS_TEXT}\"{}\")", self.css, text),
			None => f.write_str(&self.css),
		}
	}
}

/// A selector together with the longest time any wait on it may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
	pub selector: Selector,
	pub timeout: Duration,
}

impl Locator {
	pub fn new(selector: Selector, timeout_ms: u64) -> Self {
		Self {
			selector,
			timeout: Duration::from_millis(timeout_ms),
		}
	}
}

/// Names of the affordances the chat flow relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorKey {
	/// "Log in" buttons on the landing page.
	LoginBtn,
	EmailInput,
	PasswordIn,
	/// The prompt editor.
	MsgInput,
	/// Rendered assistant reply blocks.
	Responses,
	/// Entries of the conversation sidebar.
	ChatItems,
	/// "Continue" button of the credential forms.
	ContinueBtn,
	/// Control visible while a reply is streaming.
	Streaming,
	/// Control visible when a new prompt can be sent.
	Ready,
}

impl LocatorKey {
	pub const ALL: [LocatorKey; 9] = [
		LocatorKey::LoginBtn,
		LocatorKey::EmailInput,
		LocatorKey::PasswordIn,
		LocatorKey::MsgInput,
		LocatorKey::Responses,
		LocatorKey::ChatItems,
		LocatorKey::ContinueBtn,
		LocatorKey::Streaming,
		LocatorKey::Ready,
	];

	pub fn name(self) -> &'static str {
		match self {
			LocatorKey::LoginBtn => "login_btn",
			LocatorKey::EmailInput => "email_input",
			LocatorKey::PasswordIn => "password_in",
			LocatorKey::MsgInput => "msg_input",
			LocatorKey::Responses => "responses",
			LocatorKey::ChatItems => "chat_items",
			LocatorKey::ContinueBtn => "continue_btn",
			LocatorKey::Streaming => "streaming",
			LocatorKey::Ready => "ready",
		}
	}

	fn index(self) -> usize {
		self as usize
	}
}

impl fmt::Display for LocatorKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for LocatorKey {
	type Err = ChatError;

	fn from_str(name: &str) -> Result<Self, Self::Err> {
		LocatorKey::ALL
			.into_iter()
			.find(|key| key.name() == name)
			.ok_or_else(|| ChatError::Config(format!("unknown locator `{name}`")))
	}
}

/// Complete name → locator mapping. Every key always has an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorTable {
	entries: [Locator; 9],
}

impl LocatorTable {
	pub fn get(&self, key: LocatorKey) -> &Locator {
		&self.entries[key.index()]
	}

	pub fn set(&mut self, key: LocatorKey, locator: Locator) {
		self.entries[key.index()] = locator;
	}

	pub fn iter(&self) -> impl Iterator<Item = (LocatorKey, &Locator)> {
		LocatorKey::ALL.into_iter().map(move |key| (key, self.get(key)))
	}
}

impl Default for LocatorTable {
	fn default() -> Self {
		Self {
			entries: [
				Locator::new(Selector::css("button").with_text("Log in"), 20_000),
				Locator::new(Selector::css(r#"input[type="email"]"#), 20_000),
				Locator::new(Selector::css(r#"input[type="password"]"#), 20_000),
				Locator::new(Selector::css(r#"div.ProseMirror[contenteditable="true"]"#), 25_000),
				Locator::new(Selector::css("div.markdown.prose"), 25_000),
				Locator::new(Selector::css(r#"ol li[data-testid^="history-item"]"#), 20_000),
				Locator::new(Selector::css("button").with_text("Continue"), 20_000),
				Locator::new(Selector::css(r#"button[data-testid="stop-button"]"#), 200_000),
				Locator::new(Selector::css(r#"button[data-testid="send-button"]"#), 200_000),
			],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_has_text_with_either_quote_style() {
		let single: Selector = "button:has-text('Log in')".parse().unwrap();
		let double: Selector = r#"button:has-text("Log in")"#.parse().unwrap();
		assert_eq!(single, double);
		assert_eq!(single.css_part(), "button");
		assert_eq!(single.text_filter(), Some("Log in"));
	}

	#[test]
	fn plain_css_has_no_text_filter() {
		let sel: Selector = r#"input[type="email"]"#.parse().unwrap();
		assert_eq!(sel.css_part(), r#"input[type="email"]"#);
		assert!(sel.text_filter().is_none());
		assert!(sel.matches_text("anything"));
	}

	#[test]
	fn rejects_malformed_has_text() {
		assert!("button:has-text(Log in)".parse::<Selector>().is_err());
		assert!("button:has-text('Log in'".parse::<Selector>().is_err());
		assert!(":has-text('Log in')".parse::<Selector>().is_err());
		assert!("   ".parse::<Selector>().is_err());
	}

	#[test]
	fn display_round_trips_through_parse() {
		let sel = Selector::css("button").with_text("Continue");
		assert_eq!(sel.to_string(), r#"button:has-text("Continue")"#);
		assert_eq!(sel.to_string().parse::<Selector>().unwrap(), sel);
	}

	#[test]
	fn text_match_ignores_case_and_whitespace() {
		let sel = Selector::css("button").with_text("Log in");
		assert!(sel.matches_text("  LOG\n  in "));
		assert!(sel.matches_text("Log in to continue"));
		assert!(!sel.matches_text("Sign up"));
	}

	#[test]
	fn locator_keys_round_trip_by_name() {
		for key in LocatorKey::ALL {
			assert_eq!(key.name().parse::<LocatorKey>().unwrap(), key);
		}
		assert!("stop_btn".parse::<LocatorKey>().is_err());
	}

	#[test]
	fn default_table_matches_key_order() {
		let table = LocatorTable::default();
		assert_eq!(table.get(LocatorKey::LoginBtn).selector.text_filter(), Some("Log in"));
		assert_eq!(table.get(LocatorKey::MsgInput).timeout, Duration::from_millis(25_000));
		assert_eq!(table.get(LocatorKey::Ready).selector.css_part(), r#"button[data-testid="send-button"]"#);
		assert_eq!(table.iter().count(), LocatorKey::ALL.len());
	}

	#[test]
	fn set_replaces_a_single_entry() {
		let mut table = LocatorTable::default();
		table.set(LocatorKey::Responses, Locator::new(Selector::css("article"), 1_000));
		assert_eq!(table.get(LocatorKey::Responses).selector.css_part(), "article");
		assert_eq!(table.get(LocatorKey::ChatItems), LocatorTable::default().get(LocatorKey::ChatItems));
	}
}
