//! Resuming a named conversation from the sidebar.

use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::driver::PageDriver;
use crate::error::Result;
use crate::locator::{LocatorKey, Selector};

/// Result of [`ConversationSelector::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationOutcome {
	/// The conversation was activated and its prompt input is ready.
	Found,
	/// Nothing matched, or activation did not complete. The page is left as it was.
	NotFound,
}

impl ConversationOutcome {
	pub fn is_found(self) -> bool {
		self == ConversationOutcome::Found
	}
}

/// Selector for the sidebar entry titled exactly `name`.
pub fn title_selector(name: &str) -> Selector {
	let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
	Selector::css(format!(r#"a div[title="{escaped}"]"#))
}

pub struct ConversationSelector<'a> {
	config: &'a ChatConfig,
}

impl<'a> ConversationSelector<'a> {
	pub fn new(config: &'a ChatConfig) -> Self {
		Self { config }
	}

	/// Activates the conversation titled `name`.
	///
	/// Only a sidebar that never renders is an error; every other miss is
	/// reported as [`ConversationOutcome::NotFound`].
	pub async fn select(&self, page: &dyn PageDriver, name: &str) -> Result<ConversationOutcome> {
		let items = self.config.locators.get(LocatorKey::ChatItems);
		page.wait_for_element(&items.selector, items.timeout).await?;

		let title = title_selector(name);
		if let Err(err) = page.click(&title, self.config.timeouts.conversation_click).await {
			warn!(target = "pw-chat", conversation = %name, error = %err, "conversation not found or click failed");
			return Ok(ConversationOutcome::NotFound);
		}

		let input = self.config.locators.get(LocatorKey::MsgInput);
		if let Err(err) = page.wait_for_element(&input.selector, input.timeout).await {
			warn!(target = "pw-chat", conversation = %name, error = %err, "conversation opened without a prompt input");
			return Ok(ConversationOutcome::NotFound);
		}

		info!(target = "pw-chat", conversation = %name, "selected conversation");
		Ok(ConversationOutcome::Found)
	}
}
