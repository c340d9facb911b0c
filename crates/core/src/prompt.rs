use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::driver::PageDriver;
use crate::error::Result;
use crate::locator::LocatorKey;
use crate::response::{Completion, ResponseWaiter};

/// Types a prompt into the active conversation and waits for the reply to finish.
pub struct PromptSubmitter<'a> {
	config: &'a ChatConfig,
}

impl<'a> PromptSubmitter<'a> {
	pub fn new(config: &'a ChatConfig) -> Self {
		Self { config }
	}

	/// Submits `text` verbatim with `Enter` and returns once completion is signaled.
	pub async fn submit(&self, page: &dyn PageDriver, text: &str) -> Result<Completion> {
		let input = self.config.locators.get(LocatorKey::MsgInput);
		let replies = &self.config.locators.get(LocatorKey::Responses).selector;

		let field = page.wait_for_element(&input.selector, input.timeout).await?;
		page.click_element(&field, input.timeout).await?;
		page.fill_element(&field, text).await?;

		let baseline = page.count(replies).await?;
		debug!(target = "pw-chat", baseline, chars = text.chars().count(), "prompt filled");

		page.press(&input.selector, "Enter", input.timeout).await?;
		info!(target = "pw-chat", "prompt submitted");

		ResponseWaiter::new(self.config)
			.await_completion(page, self.config.timeouts.response, baseline)
			.await
	}
}
